//! Session state shared by the orchestrator and the front end.
//!
//! Each data slice sits behind its own lock so that one operation's update
//! never waits on, or clobbers, another's. Locks are held only for the
//! duration of a read or a single update, never across an await.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::catalog::SymptomCatalog;
use crate::config::DEFAULT_TOP_K;
use crate::models::{HealthReport, HealthStatus, PredictionResult, TrainSummary};
use crate::request_state::{ActiveOperation, OperationKind, OperationSlot, RequestState};
use crate::symptoms::InputReconciler;

/// Recover the data from a poisoned lock; every slice stays internally
/// consistent because updates are single assignments.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// How a notice should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// Transient confirmation.
    Info,
    /// Must be acknowledged before the user continues.
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn alert(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Alert,
            message: message.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// SessionState
// ═══════════════════════════════════════════════════════════

/// All state of one user session.
pub struct SessionState {
    pub(crate) symptoms: Mutex<InputReconciler>,
    top_k: AtomicU32,
    pub(crate) health: Mutex<OperationSlot<HealthReport>>,
    pub(crate) catalog: Mutex<OperationSlot<SymptomCatalog>>,
    pub(crate) predict: Mutex<OperationSlot<PredictionResult>>,
    pub(crate) train: Mutex<OperationSlot<TrainSummary>>,
    pub(crate) example: Mutex<OperationSlot<PredictionResult>>,
    pub(crate) prescription: Mutex<OperationSlot<PathBuf>>,
    /// Latest successful prediction from either predict or example.
    prediction: Mutex<Option<PredictionResult>>,
    notices: Mutex<VecDeque<Notice>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            symptoms: Mutex::new(InputReconciler::new()),
            top_k: AtomicU32::new(DEFAULT_TOP_K),
            health: Mutex::new(OperationSlot::new(OperationKind::HealthCheck)),
            catalog: Mutex::new(OperationSlot::new(OperationKind::CatalogFetch)),
            predict: Mutex::new(OperationSlot::new(OperationKind::Predict)),
            train: Mutex::new(OperationSlot::new(OperationKind::Train)),
            example: Mutex::new(OperationSlot::new(OperationKind::PredictExample)),
            prescription: Mutex::new(OperationSlot::new(OperationKind::Prescription)),
            prediction: Mutex::new(None),
            notices: Mutex::new(VecDeque::new()),
        }
    }

    // ── Symptom input ───────────────────────────────────────

    /// Run a mutation against the symptom input.
    pub fn with_symptoms<R>(&self, f: impl FnOnce(&mut InputReconciler) -> R) -> R {
        f(&mut lock(&self.symptoms))
    }

    /// Read the symptom input.
    pub fn symptoms(&self) -> MutexGuard<'_, InputReconciler> {
        lock(&self.symptoms)
    }

    pub fn top_k(&self) -> u32 {
        self.top_k.load(Ordering::SeqCst)
    }

    pub(crate) fn store_top_k(&self, top_k: u32) {
        self.top_k.store(top_k, Ordering::SeqCst);
    }

    // ── Operation state (read path) ─────────────────────────

    pub fn health_state(&self) -> RequestState<HealthReport> {
        lock(&self.health).state().clone()
    }

    pub fn catalog_state(&self) -> RequestState<SymptomCatalog> {
        lock(&self.catalog).state().clone()
    }

    pub fn predict_state(&self) -> RequestState<PredictionResult> {
        lock(&self.predict).state().clone()
    }

    pub fn train_state(&self) -> RequestState<TrainSummary> {
        lock(&self.train).state().clone()
    }

    pub fn example_state(&self) -> RequestState<PredictionResult> {
        lock(&self.example).state().clone()
    }

    pub fn prescription_state(&self) -> RequestState<PathBuf> {
        lock(&self.prescription).state().clone()
    }

    /// Health as shown in the header. `Unknown` until the first check resolves;
    /// a re-check in flight keeps showing the previous result.
    pub fn health(&self) -> HealthStatus {
        let slot = lock(&self.health);
        match slot.state() {
            RequestState::Success(report) => HealthStatus::from_report(report),
            RequestState::Failure(message) => HealthStatus::unreachable(message.clone()),
            RequestState::Idle | RequestState::Loading => slot
                .last_success()
                .map(HealthStatus::from_report)
                .unwrap_or_default(),
        }
    }

    /// Last fetched catalog, or an empty one.
    pub fn catalog(&self) -> SymptomCatalog {
        lock(&self.catalog).last_success().cloned().unwrap_or_default()
    }

    /// Most recent successful prediction. Survives later failures.
    pub fn prediction(&self) -> Option<PredictionResult> {
        lock(&self.prediction).clone()
    }

    pub(crate) fn set_prediction(&self, result: PredictionResult) {
        *lock(&self.prediction) = Some(result);
    }

    /// Current error message of every user-facing operation that has one.
    ///
    /// Prescription failures are kept in their slot and logged, not listed.
    pub fn errors(&self) -> Vec<(OperationKind, String)> {
        let mut errors = Vec::new();
        let mut push = |kind, message: Option<&str>| {
            if let Some(message) = message {
                errors.push((kind, message.to_string()));
            }
        };
        push(OperationKind::HealthCheck, lock(&self.health).state().error());
        push(OperationKind::CatalogFetch, lock(&self.catalog).state().error());
        push(OperationKind::Predict, lock(&self.predict).state().error());
        push(OperationKind::Train, lock(&self.train).state().error());
        push(OperationKind::PredictExample, lock(&self.example).state().error());
        errors
    }

    /// Operations currently loading.
    pub fn in_flight(&self) -> Vec<ActiveOperation> {
        [
            lock(&self.health).active(),
            lock(&self.catalog).active(),
            lock(&self.predict).active(),
            lock(&self.train).active(),
            lock(&self.example).active(),
            lock(&self.prescription).active(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn is_loading(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::HealthCheck => lock(&self.health).state().is_loading(),
            OperationKind::CatalogFetch => lock(&self.catalog).state().is_loading(),
            OperationKind::Predict => lock(&self.predict).state().is_loading(),
            OperationKind::Train => lock(&self.train).state().is_loading(),
            OperationKind::PredictExample => lock(&self.example).state().is_loading(),
            OperationKind::Prescription => lock(&self.prescription).state().is_loading(),
            OperationKind::VoicePredict => false,
        }
    }

    // ── Notices ─────────────────────────────────────────────

    pub(crate) fn push_notice(&self, notice: Notice) {
        lock(&self.notices).push_back(notice);
    }

    /// Take every pending notice, oldest first.
    pub fn drain_notices(&self) -> Vec<Notice> {
        lock(&self.notices).drain(..).collect()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_empty() {
        let state = SessionState::new();
        assert!(state.symptoms().set().is_empty());
        assert_eq!(state.top_k(), DEFAULT_TOP_K);
        assert!(state.prediction().is_none());
        assert!(state.catalog().is_empty());
        assert!(state.errors().is_empty());
        assert!(state.in_flight().is_empty());
    }

    #[test]
    fn prescription_failure_is_not_listed_as_error() {
        let state = SessionState::new();
        {
            let mut slot = lock(&state.prescription);
            let ticket = slot.begin();
            slot.fail(&ticket, "Failed to generate prescription");
        }
        {
            let mut slot = lock(&state.train);
            let ticket = slot.begin();
            slot.fail(&ticket, "Training failed");
        }
        assert_eq!(
            state.prescription_state().error(),
            Some("Failed to generate prescription")
        );
        assert_eq!(
            state.errors(),
            vec![(OperationKind::Train, "Training failed".to_string())]
        );
    }

    #[test]
    fn health_is_unknown_before_first_check() {
        let state = SessionState::new();
        assert_eq!(state.health(), HealthStatus::unknown());
        lock(&state.health).begin();
        assert_eq!(state.health(), HealthStatus::unknown());
    }

    #[test]
    fn health_recheck_keeps_previous_report() {
        let state = SessionState::new();
        let report = HealthReport {
            status: "healthy".into(),
            diseases_count: Some(3),
            features_count: Some(9),
            model_trained: Some(true),
            message: None,
        };
        {
            let mut slot = lock(&state.health);
            let ticket = slot.begin();
            slot.succeed(&ticket, report);
            slot.begin();
        }
        assert!(state.health().is_healthy());
        assert!(state.is_loading(OperationKind::HealthCheck));
    }

    #[test]
    fn errors_lists_only_failed_operations() {
        let state = SessionState::new();
        lock(&state.predict).reject("Please select at least one symptom");
        let errors = state.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, OperationKind::Predict);
    }

    #[test]
    fn notices_drain_in_order() {
        let state = SessionState::new();
        state.push_notice(Notice::info("one"));
        state.push_notice(Notice::alert("two"));
        let drained = state.drain_notices();
        assert_eq!(drained, vec![Notice::info("one"), Notice::alert("two")]);
        assert!(state.drain_notices().is_empty());
    }

    #[test]
    fn with_symptoms_mutates_in_place() {
        let state = SessionState::new();
        state.with_symptoms(|input| input.add_symptom("fever"));
        assert_eq!(state.symptoms().text(), "fever");
    }
}

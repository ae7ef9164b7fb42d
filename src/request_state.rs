//! Per-operation request state.
//!
//! Every remote operation owns one `OperationSlot`. Slots are never shared
//! between operation kinds, so a failed training run cannot clear a
//! prediction. Each `begin()` hands out a `Ticket` carrying a monotonically
//! increasing generation; a response is applied only if its ticket is still
//! current, so late or cancelled responses are dropped instead of
//! overwriting newer state.

use chrono::{DateTime, Utc};
use serde::Serialize;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Which remote operation a slot tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    HealthCheck,
    CatalogFetch,
    Predict,
    Train,
    PredictExample,
    Prescription,
    VoicePredict,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HealthCheck => write!(f, "Health check"),
            Self::CatalogFetch => write!(f, "Symptom catalog"),
            Self::Predict => write!(f, "Prediction"),
            Self::Train => write!(f, "Training"),
            Self::PredictExample => write!(f, "Example prediction"),
            Self::Prescription => write!(f, "Prescription"),
            Self::VoicePredict => write!(f, "Voice prediction"),
        }
    }
}

/// Lifecycle of one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum RequestState<T> {
    Idle,
    Loading,
    Success(T),
    Failure(String),
}

impl<T> RequestState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failure(message) => Some(message),
            _ => None,
        }
    }
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self::Idle
    }
}

/// Proof that a request was started at a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub kind: OperationKind,
    pub generation: u64,
}

/// Snapshot of an operation that is currently loading.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveOperation {
    pub kind: OperationKind,
    pub generation: u64,
    /// When the request was issued (ISO 8601).
    pub started_at: String,
}

// ═══════════════════════════════════════════════════════════
// OperationSlot
// ═══════════════════════════════════════════════════════════

/// Independent state record for one operation kind.
///
/// Keeps the last successful value next to the current state so a newer
/// failure and the stale success can be shown together.
#[derive(Debug, Clone)]
pub struct OperationSlot<T> {
    kind: OperationKind,
    state: RequestState<T>,
    last_success: Option<T>,
    generation: u64,
    started_at: Option<DateTime<Utc>>,
    /// State to restore if the pending request is cancelled.
    settled: RequestState<T>,
}

impl<T: Clone> OperationSlot<T> {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            state: RequestState::Idle,
            last_success: None,
            generation: 0,
            started_at: None,
            settled: RequestState::Idle,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn state(&self) -> &RequestState<T> {
        &self.state
    }

    pub fn last_success(&self) -> Option<&T> {
        self.last_success.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mark the slot `Loading` and issue a ticket for the new request.
    pub fn begin(&mut self) -> Ticket {
        if !self.state.is_loading() {
            self.settled = self.state.clone();
        }
        self.generation += 1;
        self.state = RequestState::Loading;
        self.started_at = Some(Utc::now());
        Ticket {
            kind: self.kind,
            generation: self.generation,
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.kind == self.kind && ticket.generation == self.generation
    }

    /// Apply a successful response. Returns `false` if the ticket is stale.
    pub fn succeed(&mut self, ticket: &Ticket, value: T) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.last_success = Some(value.clone());
        self.state = RequestState::Success(value);
        self.started_at = None;
        true
    }

    /// Apply a failed response. Returns `false` if the ticket is stale.
    pub fn fail(&mut self, ticket: &Ticket, message: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.state = RequestState::Failure(message.into());
        self.started_at = None;
        true
    }

    /// Fail without issuing a request (client-side validation).
    ///
    /// Supersedes any request still in flight.
    pub fn reject(&mut self, message: impl Into<String>) {
        self.generation += 1;
        self.state = RequestState::Failure(message.into());
        self.started_at = None;
    }

    /// Abandon the pending request, restoring the state it replaced.
    /// Returns `false` if nothing was loading.
    pub fn cancel(&mut self) -> bool {
        if !self.state.is_loading() {
            return false;
        }
        self.generation += 1;
        self.state = std::mem::take(&mut self.settled);
        self.started_at = None;
        true
    }

    /// Back to `Idle`, dropping retained values and superseding any
    /// pending request.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = RequestState::Idle;
        self.settled = RequestState::Idle;
        self.last_success = None;
        self.started_at = None;
    }

    /// Snapshot of the pending request, if any.
    pub fn active(&self) -> Option<ActiveOperation> {
        if !self.state.is_loading() {
            return None;
        }
        Some(ActiveOperation {
            kind: self.kind,
            generation: self.generation,
            started_at: self.started_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_slot_is_idle() {
        let slot: OperationSlot<u32> = OperationSlot::new(OperationKind::Predict);
        assert_eq!(slot.state(), &RequestState::Idle);
        assert!(slot.last_success().is_none());
        assert!(slot.active().is_none());
    }

    #[test]
    fn begin_sets_loading_and_active_operation() {
        let mut slot: OperationSlot<u32> = OperationSlot::new(OperationKind::Train);
        let ticket = slot.begin();
        assert!(slot.state().is_loading());
        assert_eq!(ticket.generation, 1);

        let op = slot.active().unwrap();
        assert_eq!(op.kind, OperationKind::Train);
        assert!(!op.started_at.is_empty());
    }

    #[test]
    fn success_clears_prior_failure() {
        let mut slot = OperationSlot::new(OperationKind::Predict);
        let first = slot.begin();
        assert!(slot.fail(&first, "boom"));
        assert_eq!(slot.state().error(), Some("boom"));

        let second = slot.begin();
        assert!(slot.succeed(&second, 7));
        assert_eq!(slot.state(), &RequestState::Success(7));
    }

    #[test]
    fn failure_keeps_last_success() {
        let mut slot = OperationSlot::new(OperationKind::Predict);
        let first = slot.begin();
        slot.succeed(&first, 1);
        let second = slot.begin();
        slot.fail(&second, "down");

        assert_eq!(slot.state().error(), Some("down"));
        assert_eq!(slot.last_success(), Some(&1));
    }

    #[test]
    fn stale_ticket_is_ignored() {
        let mut slot = OperationSlot::new(OperationKind::Predict);
        let old = slot.begin();
        let new = slot.begin();

        assert!(!slot.succeed(&old, 1));
        assert!(slot.state().is_loading());
        assert!(slot.succeed(&new, 2));
        assert!(!slot.fail(&old, "late"));
        assert_eq!(slot.state(), &RequestState::Success(2));
    }

    #[test]
    fn ticket_from_other_kind_is_not_current() {
        let mut predict: OperationSlot<u32> = OperationSlot::new(OperationKind::Predict);
        let mut train: OperationSlot<u32> = OperationSlot::new(OperationKind::Train);
        let ticket = train.begin();
        predict.begin();
        assert!(!predict.is_current(&ticket));
    }

    #[test]
    fn cancel_restores_settled_state_and_drops_late_response() {
        let mut slot = OperationSlot::new(OperationKind::CatalogFetch);
        let first = slot.begin();
        slot.succeed(&first, 3);

        let pending = slot.begin();
        assert!(slot.cancel());
        assert_eq!(slot.state(), &RequestState::Success(3));
        assert!(!slot.succeed(&pending, 4));
        assert_eq!(slot.last_success(), Some(&3));
    }

    #[test]
    fn cancel_without_pending_request_is_noop() {
        let mut slot: OperationSlot<u32> = OperationSlot::new(OperationKind::Train);
        assert!(!slot.cancel());
        assert_eq!(slot.generation(), 0);
    }

    #[test]
    fn double_begin_cancel_restores_pre_loading_state() {
        let mut slot: OperationSlot<u32> = OperationSlot::new(OperationKind::Predict);
        slot.reject("empty");
        slot.begin();
        slot.begin();
        slot.cancel();
        assert_eq!(slot.state().error(), Some("empty"));
    }

    #[test]
    fn reject_supersedes_in_flight_request() {
        let mut slot = OperationSlot::new(OperationKind::Predict);
        let pending = slot.begin();
        slot.reject("Please select at least one symptom");
        assert!(!slot.succeed(&pending, 9));
        assert_eq!(
            slot.state().error(),
            Some("Please select at least one symptom")
        );
    }

    #[test]
    fn reset_drops_values_and_pending_ticket() {
        let mut slot = OperationSlot::new(OperationKind::VoicePredict);
        let first = slot.begin();
        slot.succeed(&first, 1);
        let pending = slot.begin();

        slot.reset();
        assert_eq!(slot.state(), &RequestState::Idle);
        assert!(slot.last_success().is_none());
        assert!(!slot.succeed(&pending, 2));
    }

    #[test]
    fn operation_kind_display() {
        assert_eq!(OperationKind::Predict.to_string(), "Prediction");
        assert_eq!(OperationKind::PredictExample.to_string(), "Example prediction");
        assert_eq!(OperationKind::VoicePredict.to_string(), "Voice prediction");
    }

    #[test]
    fn operation_kind_serializes_snake_case() {
        let json = serde_json::to_string(&OperationKind::CatalogFetch).unwrap();
        assert_eq!(json, "\"catalog_fetch\"");
    }

    #[test]
    fn request_state_serializes_tagged() {
        let json = serde_json::to_string(&RequestState::Success(5)).unwrap();
        assert_eq!(json, r#"{"state":"success","value":5}"#);
        let idle = serde_json::to_string(&RequestState::<u32>::Idle).unwrap();
        assert_eq!(idle, r#"{"state":"idle"}"#);
    }
}

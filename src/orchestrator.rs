//! Service orchestration: drives every remote call against its own slot.
//!
//! Each operation follows the same cycle: `begin()` the slot (Loading, new
//! generation), await the backend, then apply the outcome only if the
//! ticket is still current. Failures are converted into the user-facing
//! message for that operation and stay confined to its slot.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::catalog::SymptomCatalog;
use crate::client::{PredictionBackend, PrescriptionBackend, ServiceError};
use crate::config::{DEFAULT_DOCTOR_NAME, DEFAULT_PATIENT_NAME, TOP_K_CHOICES};
use crate::models::{HealthReport, PredictionResult, PrescriptionRequest, TrainSummary};
use crate::presentation::prescription_offer;
use crate::request_state::{OperationKind, OperationSlot};
use crate::resources::{prescription_file_name, DocumentStore};
use crate::session::{lock, Notice, SessionState};
use crate::symptoms::EXAMPLE_SYMPTOMS;

pub const EMPTY_SYMPTOMS_MESSAGE: &str = "Please select at least one symptom";
pub const TRAIN_SUCCESS_MESSAGE: &str = "Model trained successfully!";

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Please select at least one symptom")]
    EmptySymptoms,

    #[error("Unsupported number of predictions: {0}")]
    InvalidTopK(u32),

    #[error("{kind} response discarded: superseded or cancelled")]
    Stale { kind: OperationKind },

    #[error("No prediction qualifies for a prescription")]
    NoPrescriptionOffer,

    #[error("{kind} failed: {source}")]
    Service {
        kind: OperationKind,
        #[source]
        source: ServiceError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Message shown when the service could not be reached at all.
fn transport_message(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::HealthCheck => "API not reachable",
        OperationKind::CatalogFetch => "Failed to fetch symptoms",
        OperationKind::Predict => "Failed to connect to API. Make sure the backend is running.",
        OperationKind::Train => "Failed to train model",
        OperationKind::PredictExample => "Failed to get example prediction",
        OperationKind::Prescription => "Failed to generate prescription",
        OperationKind::VoicePredict => "API failed",
    }
}

/// Message shown when the service answered without a message of its own.
fn fallback_message(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::HealthCheck => "API not reachable",
        OperationKind::CatalogFetch => "Failed to fetch symptoms",
        OperationKind::Predict => "Prediction failed",
        OperationKind::Train => "Training failed",
        OperationKind::PredictExample => "Example prediction failed",
        OperationKind::Prescription => "Failed to generate prescription",
        OperationKind::VoicePredict => "API failed",
    }
}

/// User-facing message for a failed operation: the service's own message
/// when it sent one, otherwise the fixed fallback for that operation.
pub fn failure_message(kind: OperationKind, error: &ServiceError) -> String {
    if let Some(message) = error.remote_message() {
        return message.to_string();
    }
    if error.is_transport() {
        transport_message(kind).to_string()
    } else {
        fallback_message(kind).to_string()
    }
}

// ═══════════════════════════════════════════════════════════
// ServiceOrchestrator
// ═══════════════════════════════════════════════════════════

/// Issues the remote calls of one session and applies their outcomes.
pub struct ServiceOrchestrator {
    state: Arc<SessionState>,
    backend: Arc<dyn PredictionBackend>,
    prescriptions: Arc<dyn PrescriptionBackend>,
    documents: DocumentStore,
}

impl ServiceOrchestrator {
    pub fn new(
        state: Arc<SessionState>,
        backend: Arc<dyn PredictionBackend>,
        prescriptions: Arc<dyn PrescriptionBackend>,
        documents: DocumentStore,
    ) -> Self {
        Self {
            state,
            backend,
            prescriptions,
            documents,
        }
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Run one request against `slot`, applying its outcome if still current.
    /// `on_success` runs while the slot is locked, before the slot records
    /// success, so dependent state lands in the same step.
    async fn run<T, F>(
        &self,
        slot: &Mutex<OperationSlot<T>>,
        request: F,
        on_success: impl FnOnce(&T),
    ) -> Result<T, OrchestratorError>
    where
        T: Clone,
        F: Future<Output = Result<T, ServiceError>>,
    {
        let ticket = lock(slot).begin();
        let kind = ticket.kind;
        tracing::debug!(%kind, generation = ticket.generation, "Request started");

        let outcome = request.await;

        let mut slot = lock(slot);
        if !slot.is_current(&ticket) {
            tracing::debug!(%kind, generation = ticket.generation, "Discarding stale response");
            return Err(OrchestratorError::Stale { kind });
        }
        match outcome {
            Ok(value) => {
                on_success(&value);
                slot.succeed(&ticket, value.clone());
                tracing::info!(%kind, generation = ticket.generation, "Request succeeded");
                Ok(value)
            }
            Err(source) => {
                let message = failure_message(kind, &source);
                tracing::warn!(%kind, error = %source, "Request failed");
                slot.fail(&ticket, message);
                Err(OrchestratorError::Service { kind, source })
            }
        }
    }

    // ── Health & catalog ────────────────────────────────────

    pub async fn check_health(&self) -> Result<HealthReport, OrchestratorError> {
        self.run(&self.state.health, self.backend.health(), |_| {}).await
    }

    pub async fn fetch_catalog(&self) -> Result<SymptomCatalog, OrchestratorError> {
        let backend = Arc::clone(&self.backend);
        let request = async move { backend.symptoms().await.map(SymptomCatalog::new) };
        self.run(&self.state.catalog, request, |_| {}).await
    }

    /// Load health and catalog concurrently. Used at startup and after
    /// training; failures stay in their slots.
    pub async fn bootstrap(&self) {
        let (health, catalog) = tokio::join!(self.check_health(), self.fetch_catalog());
        if health.is_err() || catalog.is_err() {
            tracing::debug!(
                health_ok = health.is_ok(),
                catalog_ok = catalog.is_ok(),
                "Refresh finished with errors"
            );
        }
    }

    // ── Prediction ──────────────────────────────────────────

    pub fn set_top_k(&self, top_k: u32) -> Result<(), OrchestratorError> {
        if !TOP_K_CHOICES.contains(&top_k) {
            return Err(OrchestratorError::InvalidTopK(top_k));
        }
        self.state.store_top_k(top_k);
        Ok(())
    }

    /// Predict from the current selection.
    ///
    /// An empty selection fails immediately without a network call.
    pub async fn predict(&self) -> Result<PredictionResult, OrchestratorError> {
        let symptoms = self.state.symptoms().set().as_slice().to_vec();
        if symptoms.is_empty() {
            lock(&self.state.predict).reject(EMPTY_SYMPTOMS_MESSAGE);
            tracing::debug!("Prediction blocked: no symptoms selected");
            return Err(OrchestratorError::EmptySymptoms);
        }
        let top_k = self.state.top_k();
        let state = Arc::clone(&self.state);
        self.run(
            &self.state.predict,
            self.backend.predict(&symptoms, top_k),
            |result| state.set_prediction(result.clone()),
        )
        .await
    }

    /// Demonstration prediction. On success the selection is overwritten
    /// with the fixed example symptoms, discarding the user's choice.
    pub async fn predict_example(&self) -> Result<PredictionResult, OrchestratorError> {
        let state = Arc::clone(&self.state);
        self.run(&self.state.example, self.backend.predict_example(), |result| {
            state.set_prediction(result.clone());
            state.with_symptoms(|input| input.replace_all(EXAMPLE_SYMPTOMS));
        })
        .await
    }

    // ── Training ────────────────────────────────────────────

    /// Retrain the model. On success, refresh health and catalog once each
    /// so the new counts show; on failure refresh nothing.
    pub async fn train(&self) -> Result<TrainSummary, OrchestratorError> {
        let summary = self.run(&self.state.train, self.backend.train(), |_| {}).await?;
        self.state.push_notice(Notice::info(TRAIN_SUCCESS_MESSAGE));
        self.bootstrap().await;
        Ok(summary)
    }

    // ── Prescription ────────────────────────────────────────

    /// Generate and save a prescription for `disease`.
    ///
    /// An enhancement action: failures are logged and recorded in the
    /// prescription slot but raise no notice.
    pub async fn generate_prescription(&self, disease: &str) -> Result<PathBuf, OrchestratorError> {
        let request = PrescriptionRequest {
            disease: disease.to_string(),
            patient_name: DEFAULT_PATIENT_NAME.to_string(),
            doctor_name: DEFAULT_DOCTOR_NAME.to_string(),
        };
        let kind = OperationKind::Prescription;
        let ticket = lock(&self.state.prescription).begin();
        tracing::debug!(%kind, generation = ticket.generation, disease, "Request started");

        let outcome = self.download_prescription(&request).await;

        let mut slot = lock(&self.state.prescription);
        if !slot.is_current(&ticket) {
            return Err(OrchestratorError::Stale { kind });
        }
        match outcome {
            Ok(path) => {
                tracing::info!(disease, path = %path.display(), "Prescription saved");
                slot.succeed(&ticket, path.clone());
                Ok(path)
            }
            Err(e) => {
                tracing::error!(disease, error = %e, "Failed to generate prescription");
                let message = match &e {
                    OrchestratorError::Service { source, .. } => failure_message(kind, source),
                    _ => transport_message(kind).to_string(),
                };
                slot.fail(&ticket, message);
                Err(e)
            }
        }
    }

    async fn download_prescription(
        &self,
        request: &PrescriptionRequest,
    ) -> Result<PathBuf, OrchestratorError> {
        let bytes = self
            .prescriptions
            .generate_prescription(request)
            .await
            .map_err(|source| OrchestratorError::Service {
                kind: OperationKind::Prescription,
                source,
            })?;
        let file_name = prescription_file_name(&request.disease);
        Ok(self.documents.save(&file_name, &bytes).await?)
    }

    /// Prescription for the current top prediction, if it is offered.
    pub async fn prescribe_top(&self) -> Result<PathBuf, OrchestratorError> {
        let disease = self
            .state
            .prediction()
            .as_ref()
            .and_then(prescription_offer)
            .map(String::from)
            .ok_or(OrchestratorError::NoPrescriptionOffer)?;
        self.generate_prescription(&disease).await
    }

    // ── Cancellation ────────────────────────────────────────

    /// Abandon the pending request of `kind`. Its response, if it ever
    /// arrives, is discarded. Returns `false` if nothing was pending.
    pub fn cancel(&self, kind: OperationKind) -> bool {
        let cancelled = match kind {
            OperationKind::HealthCheck => lock(&self.state.health).cancel(),
            OperationKind::CatalogFetch => lock(&self.state.catalog).cancel(),
            OperationKind::Predict => lock(&self.state.predict).cancel(),
            OperationKind::Train => lock(&self.state.train).cancel(),
            OperationKind::PredictExample => lock(&self.state.example).cancel(),
            OperationKind::Prescription => lock(&self.state.prescription).cancel(),
            OperationKind::VoicePredict => false,
        };
        if cancelled {
            tracing::info!(%kind, "Request cancelled");
        }
        cancelled
    }
}

//! Remote service seams.
//!
//! The prediction, prescription and voice services are external
//! collaborators. Each is reached through a trait so the session can run
//! against the reqwest clients in `http` or the recording `MockBackend`.

pub mod http;
pub mod mock;

pub use http::*;
pub use mock::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{HealthReport, PredictionResult, PrescriptionRequest, TrainSummary};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Service is not reachable at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Service returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Service reported failure: {}", .0.as_deref().unwrap_or("no message"))]
    Application(Option<String>),

    #[error("Unexpected response shape: {0}")]
    Schema(String),
}

impl ServiceError {
    /// Message supplied by the service itself, if any.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Application(Some(message)) => Some(message),
            _ => None,
        }
    }

    /// The request never produced a usable HTTP exchange.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::HttpClient(_) | Self::Status { .. }
        )
    }
}

/// Disease prediction service: health, catalog, predict, train, example.
#[async_trait]
pub trait PredictionBackend: Send + Sync {
    async fn health(&self) -> Result<HealthReport, ServiceError>;

    async fn symptoms(&self) -> Result<Vec<String>, ServiceError>;

    async fn predict(
        &self,
        symptoms: &[String],
        top_k: u32,
    ) -> Result<PredictionResult, ServiceError>;

    async fn train(&self) -> Result<TrainSummary, ServiceError>;

    async fn predict_example(&self) -> Result<PredictionResult, ServiceError>;
}

/// Prescription document generator. Returns the raw document bytes.
#[async_trait]
pub trait PrescriptionBackend: Send + Sync {
    async fn generate_prescription(
        &self,
        request: &PrescriptionRequest,
    ) -> Result<Vec<u8>, ServiceError>;
}

/// Voice service: transcript in, spoken audio out.
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    async fn text_predict(&self, text: &str) -> Result<Vec<u8>, ServiceError>;
}

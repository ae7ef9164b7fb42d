use serde::{Deserialize, Serialize};

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub diseases_count: Option<u64>,
    #[serde(default)]
    pub features_count: Option<u64>,
    #[serde(default)]
    pub model_trained: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Coarse service state shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// No health check has resolved yet.
    Unknown,
    Healthy,
    Error,
}

/// Health as seen by the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub state: HealthState,
    pub diseases_count: Option<u64>,
    pub features_count: Option<u64>,
    pub model_trained: Option<bool>,
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn unknown() -> Self {
        Self {
            state: HealthState::Unknown,
            diseases_count: None,
            features_count: None,
            model_trained: None,
            message: None,
        }
    }

    /// A check that never produced a report (transport or shape failure).
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            state: HealthState::Error,
            message: Some(message.into()),
            ..Self::unknown()
        }
    }

    pub fn from_report(report: &HealthReport) -> Self {
        let state = if report.status == "healthy" {
            HealthState::Healthy
        } else {
            HealthState::Error
        };
        Self {
            state,
            diseases_count: report.diseases_count,
            features_count: report.features_count,
            model_trained: report.model_trained,
            message: report.message.clone(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::unknown()
    }
}

//! View models derived from prediction and health payloads.
//!
//! Pure functions of their inputs: no I/O, no session state.

use serde::Serialize;

use crate::models::{Confidence, HealthState, HealthStatus, PredictionResult};

/// Top-ranked probability at or above which a prescription is offered.
pub const PRESCRIPTION_THRESHOLD: f64 = 0.75;

/// Styling bucket for a confidence label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
    /// Any label the backend sends outside High/Medium/Low.
    Neutral,
}

impl ConfidenceTier {
    /// Derived from the label only, never from the probability.
    pub fn from_confidence(confidence: &Confidence) -> Self {
        match confidence {
            Confidence::High => Self::High,
            Confidence::Medium => Self::Medium,
            Confidence::Low => Self::Low,
            Confidence::Other(_) => Self::Neutral,
        }
    }
}

/// One prediction row ready to display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    /// 1-based, in backend order.
    pub rank: usize,
    pub disease: String,
    pub probability: f64,
    pub confidence: String,
    pub tier: ConfidenceTier,
}

impl RankedRow {
    pub fn rank_label(&self) -> String {
        format!("#{}", self.rank)
    }

    /// e.g. `82.0%`
    pub fn percent_label(&self) -> String {
        format!("{:.1}%", self.probability * 100.0)
    }
}

/// Disease the user may request a prescription for, if any.
///
/// Only rank #1 is considered, however many lower rows clear the bar.
pub fn prescription_offer(result: &PredictionResult) -> Option<&str> {
    result
        .top()
        .filter(|row| row.probability >= PRESCRIPTION_THRESHOLD)
        .map(|row| row.disease.as_str())
}

/// Everything the results panel shows for one prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub matched: Vec<String>,
    pub matched_count: usize,
    pub unmatched: Vec<String>,
    pub unmatched_count: usize,
    pub rows: Vec<RankedRow>,
    pub prescription_for: Option<String>,
}

impl ResultView {
    pub fn from_result(result: &PredictionResult) -> Self {
        let rows = result
            .predictions
            .iter()
            .enumerate()
            .map(|(index, row)| RankedRow {
                rank: index + 1,
                disease: row.disease.clone(),
                probability: row.probability,
                confidence: row.confidence.as_str().to_string(),
                tier: ConfidenceTier::from_confidence(&row.confidence),
            })
            .collect();

        Self {
            matched: result.matched_symptoms.clone(),
            matched_count: result.matched_count,
            unmatched: result.unmatched_symptoms.clone(),
            unmatched_count: result.unmatched_count,
            rows,
            prescription_for: prescription_offer(result).map(String::from),
        }
    }

    pub fn offers_prescription(&self) -> bool {
        self.prescription_for.is_some()
    }
}

// ── Health ──────────────────────────────────────────────

/// Header badge and stats cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthView {
    pub connected: bool,
    pub label: &'static str,
    pub diseases: u64,
    pub features: u64,
    pub model_ready: bool,
    pub available_symptoms: usize,
}

impl HealthView {
    pub fn new(status: &HealthStatus, catalog_len: usize) -> Self {
        let label = match status.state {
            HealthState::Unknown => "Checking",
            HealthState::Healthy => "Connected",
            HealthState::Error => "Disconnected",
        };
        Self {
            connected: status.is_healthy(),
            label,
            diseases: status.diseases_count.unwrap_or(0),
            features: status.features_count.unwrap_or(0),
            model_ready: status.model_trained.unwrap_or(false),
            available_symptoms: catalog_len,
        }
    }
}

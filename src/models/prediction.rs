use serde::{Deserialize, Serialize};

/// Backend-assigned confidence label.
///
/// Independent of `probability`: the client displays both and never derives
/// one from the other. Labels outside High/Medium/Low are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Confidence {
    High,
    Medium,
    Low,
    Other(String),
}

impl Confidence {
    pub fn as_str(&self) -> &str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for Confidence {
    fn from(label: String) -> Self {
        match label.as_str() {
            "High" => Self::High,
            "Medium" => Self::Medium,
            "Low" => Self::Low,
            _ => Self::Other(label),
        }
    }
}

impl From<Confidence> for String {
    fn from(confidence: Confidence) -> Self {
        match confidence {
            Confidence::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked disease candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub disease: String,
    pub probability: f64,
    pub confidence: Confidence,
}

/// Payload of `/predict` and `/predict_example`.
///
/// `predictions` keeps the backend's order (descending probability);
/// the client never re-sorts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub matched_symptoms: Vec<String>,
    pub matched_count: usize,
    pub unmatched_symptoms: Vec<String>,
    pub unmatched_count: usize,
    pub predictions: Vec<PredictionRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_symptoms_checked: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PredictionResult {
    /// Rank #1, if the backend returned any rows.
    pub fn top(&self) -> Option<&PredictionRow> {
        self.predictions.first()
    }

    /// Check the invariants a well-formed payload must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        if self.matched_count != self.matched_symptoms.len() {
            return Err(format!(
                "matched_count is {} but {} matched symptoms were listed",
                self.matched_count,
                self.matched_symptoms.len()
            ));
        }
        if self.unmatched_count != self.unmatched_symptoms.len() {
            return Err(format!(
                "unmatched_count is {} but {} unmatched symptoms were listed",
                self.unmatched_count,
                self.unmatched_symptoms.len()
            ));
        }
        for (index, row) in self.predictions.iter().enumerate() {
            if !row.probability.is_finite() || !(0.0..=1.0).contains(&row.probability) {
                return Err(format!(
                    "prediction #{} ({}) has probability {} outside [0, 1]",
                    index + 1,
                    row.disease,
                    row.probability
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(disease: &str, probability: f64, confidence: Confidence) -> PredictionRow {
        PredictionRow {
            disease: disease.into(),
            probability,
            confidence,
        }
    }

    fn result(predictions: Vec<PredictionRow>) -> PredictionResult {
        PredictionResult {
            matched_symptoms: vec!["fever".into()],
            matched_count: 1,
            unmatched_symptoms: vec![],
            unmatched_count: 0,
            predictions,
            total_symptoms_checked: None,
            note: None,
        }
    }

    #[test]
    fn confidence_parses_known_labels() {
        let parsed: Confidence = serde_json::from_str("\"Medium\"").unwrap();
        assert_eq!(parsed, Confidence::Medium);
    }

    #[test]
    fn confidence_keeps_unknown_labels() {
        let parsed: Confidence = serde_json::from_str("\"Very High\"").unwrap();
        assert_eq!(parsed, Confidence::Other("Very High".into()));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"Very High\"");
    }

    #[test]
    fn confidence_is_case_sensitive() {
        let parsed: Confidence = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(parsed, Confidence::Other("high".into()));
    }

    #[test]
    fn deserializes_backend_payload_with_extras() {
        let json = r#"{
            "success": true,
            "matched_symptoms": ["fever", "cough"],
            "matched_count": 2,
            "unmatched_symptoms": ["glowing"],
            "unmatched_count": 1,
            "total_symptoms_checked": 3,
            "predictions": [
                {"disease": "Flu", "probability": 0.82, "confidence": "High"},
                {"disease": "Cold", "probability": 0.11, "confidence": "Low"}
            ]
        }"#;
        let parsed: PredictionResult = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.top().unwrap().disease, "Flu");
        assert_eq!(parsed.total_symptoms_checked, Some(3));
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let json = r#"{"matched_symptoms": [], "matched_count": 0, "predictions": []}"#;
        assert!(serde_json::from_str::<PredictionResult>(json).is_err());
    }

    #[test]
    fn validate_rejects_count_mismatch() {
        let mut bad = result(vec![]);
        bad.matched_count = 4;
        let err = bad.validate().unwrap_err();
        assert!(err.contains("matched_count"));
    }

    #[test]
    fn validate_rejects_out_of_range_probability() {
        let bad = result(vec![row("Flu", 1.4, Confidence::High)]);
        assert!(bad.validate().unwrap_err().contains("outside [0, 1]"));

        let nan = result(vec![row("Flu", f64::NAN, Confidence::High)]);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn top_is_none_without_rows() {
        assert!(result(vec![]).top().is_none());
    }
}

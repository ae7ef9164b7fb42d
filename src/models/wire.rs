use serde::{Deserialize, Serialize};

/// Request body for `POST /predict`.
#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest<'a> {
    pub symptoms: &'a [String],
    pub top_k: u32,
}

/// Request body for `POST /generate_prescription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionRequest {
    pub disease: String,
    pub patient_name: String,
    pub doctor_name: String,
}

/// Request body for the voice service's `POST /text-predict`.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceRequest<'a> {
    pub text: &'a str,
}

/// Body of `GET /symptoms` once the `success` flag has been checked.
#[derive(Debug, Clone, Deserialize)]
pub struct SymptomsResponse {
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub total_symptoms: Option<usize>,
}

/// Body of `POST /train` once the `success` flag has been checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSummary {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub features_count: Option<u64>,
    #[serde(default)]
    pub diseases_count: Option<u64>,
}

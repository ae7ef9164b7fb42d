use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{PredictionBackend, PrescriptionBackend, ServiceError, VoiceBackend};
use crate::config::{ServiceEndpoints, CONNECT_TIMEOUT_SECS};
use crate::models::{
    HealthReport, PredictRequest, PredictionResult, PrescriptionRequest, SymptomsResponse,
    TrainSummary, VoiceRequest,
};

/// Shared reqwest client: connect timeout only, no request timeout.
pub fn build_http_client() -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|e| ServiceError::HttpClient(e.to_string()))
}

fn transport_error(base_url: &str, e: reqwest::Error) -> ServiceError {
    if e.is_connect() {
        ServiceError::Connection(base_url.to_string())
    } else {
        ServiceError::HttpClient(e.to_string())
    }
}

async fn send(request: reqwest::RequestBuilder, base_url: &str) -> Result<reqwest::Response, ServiceError> {
    request.send().await.map_err(|e| transport_error(base_url, e))
}

/// Read a `{success, error?, ...}` envelope.
///
/// The backend pairs `success: false` with 4xx/5xx statuses, so the body is
/// inspected before the status. Non-JSON error bodies surface as `Status`.
async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
    base_url: &str,
) -> Result<T, ServiceError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(base_url, e))?;

    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) if status.is_success() => return Err(ServiceError::Schema(e.to_string())),
        Err(_) => {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            })
        }
    };

    match value.get("success") {
        Some(Value::Bool(true)) if status.is_success() => {
            serde_json::from_value(value).map_err(|e| ServiceError::Schema(e.to_string()))
        }
        Some(Value::Bool(false)) => Err(ServiceError::Application(
            value.get("error").and_then(Value::as_str).map(String::from),
        )),
        _ if !status.is_success() => Err(ServiceError::Status {
            status: status.as_u16(),
            body: value.to_string(),
        }),
        Some(other) => Err(ServiceError::Schema(format!(
            "`success` must be a boolean, got {other}"
        ))),
        None => Err(ServiceError::Schema("missing `success` flag".into())),
    }
}

/// Read a plain JSON body (no envelope).
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    base_url: &str,
) -> Result<T, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(base_url, e))?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceError::Schema(e.to_string()))
}

/// Read a binary body (document or audio).
async fn read_binary(response: reqwest::Response, base_url: &str) -> Result<Vec<u8>, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(base_url, e))?;
    Ok(bytes.to_vec())
}

fn validated(result: PredictionResult) -> Result<PredictionResult, ServiceError> {
    result.validate().map_err(ServiceError::Schema)?;
    Ok(result)
}

// ═══════════════════════════════════════════════════════════
// PredictionClient
// ═══════════════════════════════════════════════════════════

/// HTTP client for the disease prediction service.
pub struct PredictionClient {
    base_url: String,
    client: reqwest::Client,
}

impl PredictionClient {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl PredictionBackend for PredictionClient {
    async fn health(&self) -> Result<HealthReport, ServiceError> {
        let response = send(self.client.get(self.url("/health")), &self.base_url).await?;
        read_json(response, &self.base_url).await
    }

    async fn symptoms(&self) -> Result<Vec<String>, ServiceError> {
        let response = send(self.client.get(self.url("/symptoms")), &self.base_url).await?;
        let parsed: SymptomsResponse = read_envelope(response, &self.base_url).await?;
        if let Some(total) = parsed.total_symptoms {
            if total != parsed.symptoms.len() {
                tracing::debug!(
                    total,
                    listed = parsed.symptoms.len(),
                    "Symptom catalog total disagrees with list length"
                );
            }
        }
        Ok(parsed.symptoms)
    }

    async fn predict(
        &self,
        symptoms: &[String],
        top_k: u32,
    ) -> Result<PredictionResult, ServiceError> {
        let body = PredictRequest { symptoms, top_k };
        let request = self.client.post(self.url("/predict")).json(&body);
        let response = send(request, &self.base_url).await?;
        validated(read_envelope(response, &self.base_url).await?)
    }

    async fn train(&self) -> Result<TrainSummary, ServiceError> {
        let request = self
            .client
            .post(self.url("/train"))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        let response = send(request, &self.base_url).await?;
        read_envelope(response, &self.base_url).await
    }

    async fn predict_example(&self) -> Result<PredictionResult, ServiceError> {
        let response = send(self.client.get(self.url("/predict_example")), &self.base_url).await?;
        validated(read_envelope(response, &self.base_url).await?)
    }
}

// ═══════════════════════════════════════════════════════════
// PrescriptionClient
// ═══════════════════════════════════════════════════════════

/// HTTP client for the prescription document generator.
pub struct PrescriptionClient {
    base_url: String,
    client: reqwest::Client,
}

impl PrescriptionClient {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PrescriptionBackend for PrescriptionClient {
    async fn generate_prescription(
        &self,
        request: &PrescriptionRequest,
    ) -> Result<Vec<u8>, ServiceError> {
        let url = format!("{}/generate_prescription", self.base_url);
        let response = send(self.client.post(url).json(request), &self.base_url).await?;
        read_binary(response, &self.base_url).await
    }
}

// ═══════════════════════════════════════════════════════════
// VoiceClient
// ═══════════════════════════════════════════════════════════

/// HTTP client for the voice service.
pub struct VoiceClient {
    base_url: String,
    client: reqwest::Client,
}

impl VoiceClient {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl VoiceBackend for VoiceClient {
    async fn text_predict(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
        let url = format!("{}/text-predict", self.base_url);
        let body = VoiceRequest { text };
        let response = send(self.client.post(url).json(&body), &self.base_url).await?;
        read_binary(response, &self.base_url).await
    }
}

/// All three clients wired to one set of endpoints.
pub struct HttpBackends {
    pub prediction: PredictionClient,
    pub prescription: PrescriptionClient,
    pub voice: VoiceClient,
}

impl HttpBackends {
    pub fn new(endpoints: &ServiceEndpoints) -> Result<Self, ServiceError> {
        let client = build_http_client()?;
        Ok(Self {
            prediction: PredictionClient::new(&endpoints.prediction_base, client.clone()),
            prescription: PrescriptionClient::new(&endpoints.prescription_base, client.clone()),
            voice: VoiceClient::new(&endpoints.voice_base, client),
        })
    }
}

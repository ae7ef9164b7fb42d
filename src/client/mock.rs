use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{PredictionBackend, PrescriptionBackend, ServiceError, VoiceBackend};
use crate::models::{
    Confidence, HealthReport, PredictionResult, PredictionRow, PrescriptionRequest, TrainSummary,
};

/// Typical `/predict` payload: Flu at 0.82 (High), Common Cold at 0.12 (Low).
pub fn sample_prediction() -> PredictionResult {
    PredictionResult {
        matched_symptoms: vec!["fever".into(), "cough".into()],
        matched_count: 2,
        unmatched_symptoms: vec![],
        unmatched_count: 0,
        predictions: vec![
            PredictionRow {
                disease: "Flu".into(),
                probability: 0.82,
                confidence: Confidence::High,
            },
            PredictionRow {
                disease: "Common Cold".into(),
                probability: 0.12,
                confidence: Confidence::Low,
            },
        ],
        total_symptoms_checked: Some(2),
        note: None,
    }
}

fn healthy_report() -> HealthReport {
    HealthReport {
        status: "healthy".into(),
        diseases_count: Some(41),
        features_count: Some(132),
        model_trained: Some(true),
        message: None,
    }
}

#[derive(Default)]
struct CallCounts {
    health: AtomicUsize,
    symptoms: AtomicUsize,
    predict: AtomicUsize,
    train: AtomicUsize,
    example: AtomicUsize,
    prescription: AtomicUsize,
    voice: AtomicUsize,
}

/// In-memory backend for tests and offline demos.
///
/// Answers every service with a configurable result, counts calls, and can
/// hold a call open on a `Notify` gate to exercise in-flight behaviour.
pub struct MockBackend {
    health: Mutex<Result<HealthReport, ServiceError>>,
    symptoms: Mutex<Result<Vec<String>, ServiceError>>,
    predict: Mutex<Result<PredictionResult, ServiceError>>,
    train: Mutex<Result<TrainSummary, ServiceError>>,
    example: Mutex<Result<PredictionResult, ServiceError>>,
    prescription: Mutex<Result<Vec<u8>, ServiceError>>,
    voice: Mutex<Result<Vec<u8>, ServiceError>>,
    health_gate: Mutex<Option<Arc<Notify>>>,
    predict_gate: Mutex<Option<Arc<Notify>>>,
    train_gate: Mutex<Option<Arc<Notify>>>,
    voice_gate: Mutex<Option<Arc<Notify>>>,
    last_predict: Mutex<Option<(Vec<String>, u32)>>,
    last_prescription: Mutex<Option<PrescriptionRequest>>,
    last_voice_text: Mutex<Option<String>>,
    calls: CallCounts,
}

impl MockBackend {
    /// Every service up, model trained.
    pub fn healthy() -> Self {
        Self {
            health: Mutex::new(Ok(healthy_report())),
            symptoms: Mutex::new(Ok(vec![
                "fever".into(),
                "cough".into(),
                "headache".into(),
                "fatigue".into(),
            ])),
            predict: Mutex::new(Ok(sample_prediction())),
            train: Mutex::new(Ok(TrainSummary {
                message: Some("Model trained successfully".into()),
                features_count: Some(132),
                diseases_count: Some(41),
            })),
            example: Mutex::new(Ok(sample_prediction())),
            prescription: Mutex::new(Ok(b"%PDF-1.4 mock prescription".to_vec())),
            voice: Mutex::new(Ok(b"ID3 mock audio".to_vec())),
            health_gate: Mutex::new(None),
            predict_gate: Mutex::new(None),
            train_gate: Mutex::new(None),
            voice_gate: Mutex::new(None),
            last_predict: Mutex::new(None),
            last_prescription: Mutex::new(None),
            last_voice_text: Mutex::new(None),
            calls: CallCounts::default(),
        }
    }

    /// Every service refuses connections.
    pub fn unreachable() -> Self {
        let down = || ServiceError::Connection("http://localhost:5000".into());
        let mock = Self::healthy();
        mock.set_health(Err(down()));
        mock.set_symptoms(Err(down()));
        mock.set_predict(Err(down()));
        mock.set_train(Err(down()));
        mock.set_example(Err(down()));
        mock.set_prescription(Err(down()));
        mock.set_voice(Err(down()));
        mock
    }

    pub fn set_health(&self, result: Result<HealthReport, ServiceError>) {
        *lock(&self.health) = result;
    }

    pub fn set_symptoms(&self, result: Result<Vec<String>, ServiceError>) {
        *lock(&self.symptoms) = result;
    }

    pub fn set_predict(&self, result: Result<PredictionResult, ServiceError>) {
        *lock(&self.predict) = result;
    }

    pub fn set_train(&self, result: Result<TrainSummary, ServiceError>) {
        *lock(&self.train) = result;
    }

    pub fn set_example(&self, result: Result<PredictionResult, ServiceError>) {
        *lock(&self.example) = result;
    }

    pub fn set_prescription(&self, result: Result<Vec<u8>, ServiceError>) {
        *lock(&self.prescription) = result;
    }

    pub fn set_voice(&self, result: Result<Vec<u8>, ServiceError>) {
        *lock(&self.voice) = result;
    }

    /// Hold every `health` call until the gate is notified.
    pub fn gate_health(&self, gate: Arc<Notify>) {
        *lock(&self.health_gate) = Some(gate);
    }

    /// Hold every `predict` call until the gate is notified.
    pub fn gate_predict(&self, gate: Arc<Notify>) {
        *lock(&self.predict_gate) = Some(gate);
    }

    /// Hold every `train` call until the gate is notified.
    pub fn gate_train(&self, gate: Arc<Notify>) {
        *lock(&self.train_gate) = Some(gate);
    }

    /// Hold every `text_predict` call until the gate is notified.
    pub fn gate_voice(&self, gate: Arc<Notify>) {
        *lock(&self.voice_gate) = Some(gate);
    }

    pub fn health_calls(&self) -> usize {
        self.calls.health.load(Ordering::SeqCst)
    }

    pub fn symptom_calls(&self) -> usize {
        self.calls.symptoms.load(Ordering::SeqCst)
    }

    pub fn predict_calls(&self) -> usize {
        self.calls.predict.load(Ordering::SeqCst)
    }

    pub fn train_calls(&self) -> usize {
        self.calls.train.load(Ordering::SeqCst)
    }

    pub fn example_calls(&self) -> usize {
        self.calls.example.load(Ordering::SeqCst)
    }

    pub fn prescription_calls(&self) -> usize {
        self.calls.prescription.load(Ordering::SeqCst)
    }

    pub fn voice_calls(&self) -> usize {
        self.calls.voice.load(Ordering::SeqCst)
    }

    /// Symptoms and top-k of the most recent `predict` call.
    pub fn last_predict(&self) -> Option<(Vec<String>, u32)> {
        lock(&self.last_predict).clone()
    }

    pub fn last_prescription(&self) -> Option<PrescriptionRequest> {
        lock(&self.last_prescription).clone()
    }

    pub fn last_voice_text(&self) -> Option<String> {
        lock(&self.last_voice_text).clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::healthy()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn wait_on(gate: &Mutex<Option<Arc<Notify>>>) {
    let gate = lock(gate).clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

#[async_trait]
impl PredictionBackend for MockBackend {
    async fn health(&self) -> Result<HealthReport, ServiceError> {
        self.calls.health.fetch_add(1, Ordering::SeqCst);
        wait_on(&self.health_gate).await;
        lock(&self.health).clone()
    }

    async fn symptoms(&self) -> Result<Vec<String>, ServiceError> {
        self.calls.symptoms.fetch_add(1, Ordering::SeqCst);
        lock(&self.symptoms).clone()
    }

    async fn predict(
        &self,
        symptoms: &[String],
        top_k: u32,
    ) -> Result<PredictionResult, ServiceError> {
        self.calls.predict.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_predict) = Some((symptoms.to_vec(), top_k));
        wait_on(&self.predict_gate).await;
        lock(&self.predict).clone()
    }

    async fn train(&self) -> Result<TrainSummary, ServiceError> {
        self.calls.train.fetch_add(1, Ordering::SeqCst);
        wait_on(&self.train_gate).await;
        lock(&self.train).clone()
    }

    async fn predict_example(&self) -> Result<PredictionResult, ServiceError> {
        self.calls.example.fetch_add(1, Ordering::SeqCst);
        lock(&self.example).clone()
    }
}

#[async_trait]
impl PrescriptionBackend for MockBackend {
    async fn generate_prescription(
        &self,
        request: &PrescriptionRequest,
    ) -> Result<Vec<u8>, ServiceError> {
        self.calls.prescription.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_prescription) = Some(request.clone());
        lock(&self.prescription).clone()
    }
}

#[async_trait]
impl VoiceBackend for MockBackend {
    async fn text_predict(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
        self.calls.voice.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_voice_text) = Some(text.to_string());
        wait_on(&self.voice_gate).await;
        lock(&self.voice).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_returns_configured_results_and_counts_calls() {
        let mock = MockBackend::healthy();
        let report = mock.health().await.unwrap();
        assert_eq!(report.status, "healthy");
        assert_eq!(mock.health_calls(), 1);

        mock.set_train(Err(ServiceError::Application(Some("no data".into()))));
        let err = mock.train().await.unwrap_err();
        assert_eq!(err.remote_message(), Some("no data"));
        assert_eq!(mock.train_calls(), 1);
    }

    #[tokio::test]
    async fn mock_records_predict_arguments() {
        let mock = MockBackend::healthy();
        let symptoms = vec!["fever".to_string()];
        mock.predict(&symptoms, 3).await.unwrap();
        assert_eq!(mock.last_predict(), Some((symptoms, 3)));
    }

    #[tokio::test]
    async fn unreachable_mock_fails_everything() {
        let mock = MockBackend::unreachable();
        assert!(mock.symptoms().await.unwrap_err().is_transport());
        assert!(mock.text_predict("hello").await.is_err());
    }

    #[test]
    fn sample_prediction_is_valid() {
        assert!(sample_prediction().validate().is_ok());
    }
}

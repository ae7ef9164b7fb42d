use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "MediPredict";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Port of the prediction service (health, symptoms, predict, train).
pub const PREDICTION_PORT: u16 = 5000;

/// Port of the prescription document service.
pub const PRESCRIPTION_PORT: u16 = 5020;

/// Voice service address. Fixed, never derived from the deployment host.
pub const VOICE_BASE_URL: &str = "http://localhost:5030";

/// Identity fields sent with every prescription request.
pub const DEFAULT_PATIENT_NAME: &str = "Patient";
pub const DEFAULT_DOCTOR_NAME: &str = "Dr. Tantry";

/// Number of predictions requested when the user has not picked one.
pub const DEFAULT_TOP_K: u32 = 5;

/// Top-K choices offered to the user.
pub const TOP_K_CHOICES: &[u32] = &[3, 5, 10];

/// Connect timeout for every service. Requests themselves have no timeout;
/// a hung call stays `Loading` until cancelled.
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,medipredict_lib=debug"
}

/// Directory where prescription documents are written.
/// The user's download folder, or the working directory if there is none.
pub fn downloads_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

// ═══════════════════════════════════════════════════════════
// Service endpoints
// ═══════════════════════════════════════════════════════════

/// Base addresses of the three independent services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub prediction_base: String,
    pub prescription_base: String,
    pub voice_base: String,
}

impl ServiceEndpoints {
    /// Resolve the host-relative services against the deployment host.
    ///
    /// The voice service keeps its fixed address on every host.
    pub fn for_host(host: &str) -> Self {
        let host = host.trim();
        let host = if host.is_empty() { "localhost" } else { host };
        Self {
            prediction_base: format!("http://{host}:{PREDICTION_PORT}"),
            prescription_base: format!("http://{host}:{PRESCRIPTION_PORT}"),
            voice_base: VOICE_BASE_URL.to_string(),
        }
    }

    /// Resolve from `MEDIPREDICT_HOST`, then apply per-service URL overrides.
    pub fn from_env() -> Self {
        let host = std::env::var("MEDIPREDICT_HOST").unwrap_or_else(|_| "localhost".into());
        let mut endpoints = Self::for_host(&host);
        if let Ok(url) = std::env::var("MEDIPREDICT_PREDICTION_URL") {
            endpoints.prediction_base = url;
        }
        if let Ok(url) = std::env::var("MEDIPREDICT_PRESCRIPTION_URL") {
            endpoints.prescription_base = url;
        }
        if let Ok(url) = std::env::var("MEDIPREDICT_VOICE_URL") {
            endpoints.voice_base = url;
        }
        endpoints.normalized()
    }

    fn normalized(mut self) -> Self {
        for base in [
            &mut self.prediction_base,
            &mut self.prescription_base,
            &mut self.voice_base,
        ] {
            let trimmed = base.trim_end_matches('/').len();
            base.truncate(trimmed);
        }
        self
    }
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self::for_host("localhost")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_uses_local_ports() {
        let endpoints = ServiceEndpoints::for_host("localhost");
        assert_eq!(endpoints.prediction_base, "http://localhost:5000");
        assert_eq!(endpoints.prescription_base, "http://localhost:5020");
        assert_eq!(endpoints.voice_base, "http://localhost:5030");
    }

    #[test]
    fn remote_host_is_used_for_prediction_and_prescription() {
        let endpoints = ServiceEndpoints::for_host("192.168.1.20");
        assert_eq!(endpoints.prediction_base, "http://192.168.1.20:5000");
        assert_eq!(endpoints.prescription_base, "http://192.168.1.20:5020");
    }

    #[test]
    fn voice_base_ignores_host() {
        let endpoints = ServiceEndpoints::for_host("clinic.example.org");
        assert_eq!(endpoints.voice_base, VOICE_BASE_URL);
    }

    #[test]
    fn empty_host_falls_back_to_localhost() {
        assert_eq!(ServiceEndpoints::for_host("  "), ServiceEndpoints::default());
    }

    #[test]
    fn normalized_trims_trailing_slashes() {
        let endpoints = ServiceEndpoints {
            prediction_base: "http://a:1/".into(),
            prescription_base: "http://b:2//".into(),
            voice_base: "http://c:3".into(),
        }
        .normalized();
        assert_eq!(endpoints.prediction_base, "http://a:1");
        assert_eq!(endpoints.prescription_base, "http://b:2");
        assert_eq!(endpoints.voice_base, "http://c:3");
    }

    #[test]
    fn default_top_k_is_a_choice() {
        assert!(TOP_K_CHOICES.contains(&DEFAULT_TOP_K));
    }

    #[test]
    fn app_name_is_medipredict() {
        assert_eq!(APP_NAME, "MediPredict");
    }
}

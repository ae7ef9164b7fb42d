//! Voice assistant: speak symptoms, hear the service's spoken answer.
//!
//! Runs beside the main prediction flow and never touches the symptom
//! selection. One cycle:
//!
//! ```text
//! Idle → Listening → stop ─┬─ blank transcript ──────────────→ Idle
//!                          └─ Submitting ─┬─ audio ──→ PlayingResponse
//!                                         └─ error ──→ Failed (+ alert)
//! ```
//!
//! A failed submission raises a blocking alert instead of an inline error.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::client::{ServiceError, VoiceBackend};
use crate::request_state::{OperationKind, OperationSlot, RequestState, Ticket};
use crate::resources::MaterializedResource;
use crate::session::{lock, Notice};

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Already listening")]
    AlreadyListening,

    #[error("Not listening")]
    NotListening,

    #[error("Speech capture error: {0}")]
    Capture(String),

    #[error("Voice service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoicePhase {
    Idle,
    Listening,
    Submitting,
    PlayingResponse,
    Failed,
}

/// How a `stop` ended.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceOutcome {
    /// Nothing was said; no request was made.
    Empty,
    /// The response audio, already handed to the player.
    Played(MaterializedResource),
    /// A newer `start` superseded this submission.
    Discarded,
}

// ═══════════════════════════════════════════════════════════
// Seams
// ═══════════════════════════════════════════════════════════

/// Speech-to-text source. Captures a single utterance per `start`.
#[async_trait]
pub trait SpeechCapture: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Begin capturing, discarding any previous transcript.
    async fn start(&self) -> Result<(), VoiceError>;

    /// End capture and return the final transcript.
    async fn stop(&self) -> Result<String, VoiceError>;

    /// Transcript captured so far.
    fn transcript(&self) -> String;
}

#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Start playback. Returns once playback is underway, not when it ends.
    async fn play(&self, audio: &MaterializedResource) -> Result<(), VoiceError>;
}

/// Capture fed with text instead of a microphone.
///
/// Used by the console front end (typed "speech") and in tests.
pub struct ScriptedCapture {
    supported: bool,
    inner: Mutex<CaptureInner>,
}

#[derive(Default)]
struct CaptureInner {
    listening: bool,
    transcript: String,
}

impl ScriptedCapture {
    pub fn new() -> Self {
        Self {
            supported: true,
            inner: Mutex::new(CaptureInner::default()),
        }
    }

    /// A capture device that is not available on this platform.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Feed recognised words. Ignored unless listening.
    pub fn hear(&self, words: &str) -> bool {
        let mut inner = lock(&self.inner);
        if !inner.listening {
            return false;
        }
        if !inner.transcript.is_empty() {
            inner.transcript.push(' ');
        }
        inner.transcript.push_str(words);
        true
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.inner).listening
    }
}

impl Default for ScriptedCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechCapture for ScriptedCapture {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn start(&self) -> Result<(), VoiceError> {
        if !self.supported {
            return Err(VoiceError::Capture(
                "Speech recognition is not supported".into(),
            ));
        }
        let mut inner = lock(&self.inner);
        inner.listening = true;
        inner.transcript.clear();
        Ok(())
    }

    async fn stop(&self) -> Result<String, VoiceError> {
        let mut inner = lock(&self.inner);
        inner.listening = false;
        Ok(inner.transcript.clone())
    }

    fn transcript(&self) -> String {
        lock(&self.inner).transcript.clone()
    }
}

/// Plays audio through an external program (`<program> [args..] <file>`).
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Player from `MEDIPREDICT_AUDIO_PLAYER` (program and arguments,
    /// whitespace separated), else the platform's file opener.
    pub fn from_env() -> Self {
        if let Ok(command_line) = std::env::var("MEDIPREDICT_AUDIO_PLAYER") {
            let mut parts = command_line.split_whitespace().map(String::from);
            if let Some(program) = parts.next() {
                return Self::new(program, parts.collect());
            }
        }
        Self::platform_default()
    }

    pub fn platform_default() -> Self {
        #[cfg(target_os = "windows")]
        let program = "explorer";
        #[cfg(target_os = "macos")]
        let program = "open";
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let program = "xdg-open";
        Self::new(program, Vec::new())
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, audio: &MaterializedResource) -> Result<(), VoiceError> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(audio.path())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| VoiceError::Playback(format!("Failed to start {}: {e}", self.program)))?;

        // The clone keeps the file alive until the player exits
        let held = audio.clone();
        let program = self.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::debug!(id = %held.id(), "Playback finished")
                }
                Ok(status) => tracing::warn!(%program, %status, "Audio player exited with error"),
                Err(e) => tracing::warn!(%program, error = %e, "Audio player failed"),
            }
        });
        Ok(())
    }
}

/// Records playback requests without producing sound.
#[derive(Default)]
pub struct SilentPlayer {
    played: Mutex<Vec<MaterializedResource>>,
}

impl SilentPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<MaterializedResource> {
        lock(&self.played).clone()
    }
}

#[async_trait]
impl AudioPlayer for SilentPlayer {
    async fn play(&self, audio: &MaterializedResource) -> Result<(), VoiceError> {
        tracing::info!(url = %audio.url(), bytes = audio.len(), "Response audio ready");
        lock(&self.played).push(audio.clone());
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// VoiceAssistant
// ═══════════════════════════════════════════════════════════

struct AssistantInner {
    phase: VoicePhase,
    request: OperationSlot<MaterializedResource>,
}

/// Alert text for a failed submission. HTTP-level failures collapse to
/// "API failed"; a service that could not be reached says so.
pub fn voice_failure_message(error: &ServiceError) -> String {
    match error {
        ServiceError::Connection(_) | ServiceError::HttpClient(_) => "Failed to fetch".to_string(),
        _ => "API failed".to_string(),
    }
}

pub struct VoiceAssistant {
    capture: Arc<dyn SpeechCapture>,
    backend: Arc<dyn VoiceBackend>,
    player: Arc<dyn AudioPlayer>,
    inner: Mutex<AssistantInner>,
    alerts: Mutex<VecDeque<Notice>>,
}

impl VoiceAssistant {
    pub fn new(
        capture: Arc<dyn SpeechCapture>,
        backend: Arc<dyn VoiceBackend>,
        player: Arc<dyn AudioPlayer>,
    ) -> Self {
        Self {
            capture,
            backend,
            player,
            inner: Mutex::new(AssistantInner {
                phase: VoicePhase::Idle,
                request: OperationSlot::new(OperationKind::VoicePredict),
            }),
            alerts: Mutex::new(VecDeque::new()),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.capture.is_supported()
    }

    pub fn phase(&self) -> VoicePhase {
        lock(&self.inner).phase
    }

    pub fn transcript(&self) -> String {
        self.capture.transcript()
    }

    pub fn request_state(&self) -> RequestState<MaterializedResource> {
        lock(&self.inner).request.state().clone()
    }

    /// Audio of the last answer, kept for replay until the next `start`.
    pub fn response(&self) -> Option<MaterializedResource> {
        lock(&self.inner).request.state().value().cloned()
    }

    /// Begin listening. Drops the previous answer and transcript; a
    /// submission still in flight is superseded.
    pub async fn start(&self) -> Result<(), VoiceError> {
        {
            let mut inner = lock(&self.inner);
            if inner.phase == VoicePhase::Listening {
                return Err(VoiceError::AlreadyListening);
            }
            inner.request.reset();
            inner.phase = VoicePhase::Listening;
        }
        if let Err(e) = self.capture.start().await {
            tracing::warn!(error = %e, "Speech capture failed to start");
            lock(&self.inner).phase = VoicePhase::Idle;
            return Err(e);
        }
        tracing::debug!("Listening");
        Ok(())
    }

    /// Stop listening and submit what was heard.
    ///
    /// The phase leaves `Listening` under the same lock as the check, so
    /// a second `stop` racing this one is rejected.
    pub async fn stop(&self) -> Result<VoiceOutcome, VoiceError> {
        let ticket = {
            let mut inner = lock(&self.inner);
            if inner.phase != VoicePhase::Listening {
                return Err(VoiceError::NotListening);
            }
            inner.phase = VoicePhase::Submitting;
            inner.request.begin()
        };
        let transcript = match self.capture.stop().await {
            Ok(transcript) => transcript,
            Err(e) => {
                self.abandon(&ticket);
                return Err(e);
            }
        };

        if transcript.trim().is_empty() {
            self.abandon(&ticket);
            tracing::debug!("Empty transcript, nothing to submit");
            return Ok(VoiceOutcome::Empty);
        }
        self.submit(&ticket, transcript).await
    }

    /// Back to `Idle` unless a newer `start` already took over.
    fn abandon(&self, ticket: &Ticket) {
        let mut inner = lock(&self.inner);
        if inner.request.is_current(ticket) {
            inner.request.cancel();
            inner.phase = VoicePhase::Idle;
        }
    }

    async fn submit(&self, ticket: &Ticket, transcript: String) -> Result<VoiceOutcome, VoiceError> {
        tracing::debug!(generation = ticket.generation, chars = transcript.len(), "Submitting transcript");

        let outcome = match self.backend.text_predict(&transcript).await {
            Ok(bytes) => MaterializedResource::audio(&bytes).map_err(VoiceError::from),
            Err(e) => Err(VoiceError::Service(e)),
        };

        let audio = {
            let mut inner = lock(&self.inner);
            if !inner.request.is_current(ticket) {
                tracing::debug!(generation = ticket.generation, "Discarding superseded voice response");
                return Ok(VoiceOutcome::Discarded);
            }
            match outcome {
                Ok(audio) => {
                    inner.request.succeed(ticket, audio.clone());
                    inner.phase = VoicePhase::PlayingResponse;
                    audio
                }
                Err(e) => {
                    let message = match &e {
                        VoiceError::Service(source) => voice_failure_message(source),
                        other => other.to_string(),
                    };
                    tracing::warn!(error = %e, "Voice prediction failed");
                    inner.request.fail(ticket, message.clone());
                    inner.phase = VoicePhase::Failed;
                    lock(&self.alerts).push_back(Notice::alert(format!("Error: {message}")));
                    return Err(e);
                }
            }
        };

        // Playback problems are logged; the answer stays available for replay
        if let Err(e) = self.player.play(&audio).await {
            tracing::warn!(error = %e, "Autoplay failed");
        }
        Ok(VoiceOutcome::Played(audio))
    }

    /// Play the last answer again.
    pub async fn replay(&self) -> Result<(), VoiceError> {
        let audio = self
            .response()
            .ok_or_else(|| VoiceError::Playback("No response to play".into()))?;
        self.player.play(&audio).await
    }

    /// Take pending blocking alerts, oldest first.
    pub fn drain_alerts(&self) -> Vec<Notice> {
        lock(&self.alerts).drain(..).collect()
    }
}

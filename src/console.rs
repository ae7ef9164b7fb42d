//! Line-oriented front end for one session.
//!
//! Every remote operation runs as its own task, so the prompt stays
//! responsive while requests are pending and `cancel` can abandon them.
//! Finished tasks report back over a channel and are rendered between
//! prompts.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::client::HttpBackends;
use crate::config::{self, ServiceEndpoints, APP_NAME, APP_VERSION, TOP_K_CHOICES};
use crate::orchestrator::ServiceOrchestrator;
use crate::presentation::{HealthView, ResultView};
use crate::request_state::OperationKind;
use crate::resources::DocumentStore;
use crate::session::{Notice, NoticeLevel, SessionState};
use crate::symptoms::ActiveView;
use crate::voice::{CommandPlayer, ScriptedCapture, VoiceAssistant, VoiceOutcome, VoicePhase};

/// Parsed console input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Add(String),
    Remove(String),
    Text(String),
    Clear,
    Selection,
    Catalog(Option<String>),
    View(ActiveView),
    TopK(u32),
    Predict,
    Example,
    Train,
    Health,
    Prescribe(Option<String>),
    Cancel(OperationKind),
    VoiceStart,
    VoiceSay(String),
    VoiceStop,
    VoiceReplay,
    Status,
    Quit,
    Empty,
    Invalid(String),
}

fn operation_kind(name: &str) -> Option<OperationKind> {
    match name {
        "health" => Some(OperationKind::HealthCheck),
        "symptoms" | "catalog" => Some(OperationKind::CatalogFetch),
        "predict" => Some(OperationKind::Predict),
        "train" => Some(OperationKind::Train),
        "example" => Some(OperationKind::PredictExample),
        "prescribe" | "prescription" => Some(OperationKind::Prescription),
        _ => None,
    }
}

fn rest_of(input: &str) -> String {
    input
        .trim()
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_default()
}

/// Parse one line of input. Arguments keep their original case.
pub fn parse_command(input: &str) -> Command {
    let parts: Vec<&str> = input.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return Command::Empty;
    };
    let rest = rest_of(input);

    match first.to_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "add" if !rest.is_empty() => Command::Add(rest),
        "remove" | "rm" if !rest.is_empty() => Command::Remove(rest),
        "text" => Command::Text(rest),
        "clear" => Command::Clear,
        "list" | "selected" => Command::Selection,
        "symptoms" | "catalog" => Command::Catalog((!rest.is_empty()).then_some(rest)),
        "view" => match rest.to_lowercase().as_str() {
            "predict" => Command::View(ActiveView::Predict),
            "symptoms" => Command::View(ActiveView::Symptoms),
            "manage" => Command::View(ActiveView::Manage),
            _ => Command::Invalid("usage: view <predict|symptoms|manage>".into()),
        },
        "topk" | "top-k" => match rest.parse() {
            Ok(n) => Command::TopK(n),
            Err(_) => Command::Invalid(format!("usage: topk <{}>", top_k_choices())),
        },
        "predict" => Command::Predict,
        "example" => Command::Example,
        "train" => Command::Train,
        "health" => Command::Health,
        "prescribe" => Command::Prescribe((!rest.is_empty()).then_some(rest)),
        "cancel" => match operation_kind(&rest.to_lowercase()) {
            Some(kind) => Command::Cancel(kind),
            None => Command::Invalid(
                "usage: cancel <health|symptoms|predict|train|example|prescribe>".into(),
            ),
        },
        "voice" => match parts.get(1).map(|s| s.to_lowercase()).as_deref() {
            Some("start") => Command::VoiceStart,
            Some("stop") => Command::VoiceStop,
            Some("replay") => Command::VoiceReplay,
            _ => Command::Invalid("usage: voice <start|stop|replay>".into()),
        },
        "say" if !rest.is_empty() => Command::VoiceSay(rest),
        "status" => Command::Status,
        "quit" | "exit" => Command::Quit,
        other => Command::Invalid(format!("Unknown command '{other}'. Type 'help'.")),
    }
}

fn top_k_choices() -> String {
    TOP_K_CHOICES
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

pub const HELP: &str = "\
Symptoms
  add <name>            add a symptom (commas add several)
  remove <name>         remove a symptom
  text <a, b, c>        replace the selection from text
  clear                 clear the selection
  list                  show the selection
  symptoms [term]       browse the catalog
  view <predict|symptoms|manage>
Prediction
  topk <3|5|10>         number of predictions
  predict               predict from the selection
  example               run the example prediction
  prescribe [disease]   download a prescription
Model
  train                 retrain the model
  health                re-check the service
Voice
  voice start | say <words> | voice stop | voice replay
Other
  cancel <operation>    abandon a pending request
  status                show pending requests and errors
  quit";

// ═══════════════════════════════════════════════════════════
// Rendering
// ═══════════════════════════════════════════════════════════

pub fn render_health(view: &HealthView) -> String {
    format!(
        "API: {} | Diseases: {} | Features: {} | Model: {} | Symptoms available: {}",
        view.label,
        view.diseases,
        view.features,
        if view.model_ready { "ready" } else { "not trained" },
        view.available_symptoms,
    )
}

pub fn render_result(view: &ResultView) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Matched ({}): {}\n",
        view.matched_count,
        view.matched.join(", ")
    ));
    if view.unmatched_count > 0 {
        out.push_str(&format!(
            "Not recognised ({}): {}\n",
            view.unmatched_count,
            view.unmatched.join(", ")
        ));
    }
    for row in &view.rows {
        out.push_str(&format!(
            "{:>4}  {:<32} {:>6}  {}\n",
            row.rank_label(),
            row.disease,
            row.percent_label(),
            row.confidence
        ));
    }
    if let Some(disease) = &view.prescription_for {
        out.push_str(&format!(
            "High confidence for {disease}. Type 'prescribe' to download a prescription.\n"
        ));
    }
    out
}

fn render_notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Info => format!("[info] {}", notice.message),
        NoticeLevel::Alert => format!("[alert] {}", notice.message),
    }
}

// ═══════════════════════════════════════════════════════════
// Console
// ═══════════════════════════════════════════════════════════

/// Whether the loop should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console {
    orchestrator: Arc<ServiceOrchestrator>,
    voice: Arc<VoiceAssistant>,
    capture: Arc<ScriptedCapture>,
    reports: mpsc::UnboundedSender<String>,
}

impl Console {
    /// Returns the console and the receiver of background task reports.
    pub fn new(
        orchestrator: Arc<ServiceOrchestrator>,
        voice: Arc<VoiceAssistant>,
        capture: Arc<ScriptedCapture>,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (reports, rx) = mpsc::unbounded_channel();
        (
            Self {
                orchestrator,
                voice,
                capture,
                reports,
            },
            rx,
        )
    }

    fn state(&self) -> &SessionState {
        self.orchestrator.state()
    }

    fn selection(&self) -> String {
        let symptoms = self.state().symptoms();
        if symptoms.set().is_empty() {
            "No symptoms selected".to_string()
        } else {
            format!("Selected ({}): {}", symptoms.set().len(), symptoms.text())
        }
    }

    fn health_line(&self) -> String {
        let view = HealthView::new(&self.state().health(), self.state().catalog().len());
        render_health(&view)
    }

    /// Run `task` in the background and report its rendered outcome.
    fn spawn_report<F>(&self, task: F)
    where
        F: std::future::Future<Output = String> + Send + 'static,
    {
        let reports = self.reports.clone();
        tokio::spawn(async move {
            // Receiver gone means the console is shutting down
            let _ = reports.send(task.await);
        });
    }

    /// Execute one command. Output meant for the user is returned.
    pub fn execute(&self, command: Command) -> (Flow, String) {
        let out = match command {
            Command::Empty => String::new(),
            Command::Help => HELP.to_string(),
            Command::Quit => return (Flow::Quit, "Goodbye".to_string()),
            Command::Invalid(message) => message,

            Command::Add(name) => {
                self.state().with_symptoms(|input| input.add_symptom(&name));
                self.selection()
            }
            Command::Remove(name) => {
                if !self.state().with_symptoms(|input| input.remove_symptom(&name)) {
                    format!("'{name}' is not selected")
                } else {
                    self.selection()
                }
            }
            Command::Text(raw) => {
                self.state().with_symptoms(|input| input.set_from_text(&raw));
                self.selection()
            }
            Command::Clear => {
                self.state().with_symptoms(|input| input.clear_all());
                self.selection()
            }
            Command::Selection => self.selection(),
            Command::Catalog(term) => {
                self.state()
                    .with_symptoms(|input| input.set_view(ActiveView::Symptoms));
                let catalog = self.state().catalog();
                let matches = catalog.filter(term.as_deref().unwrap_or(""));
                if matches.is_empty() {
                    "No symptoms found".to_string()
                } else {
                    format!("{} symptom(s): {}", matches.len(), matches.join(", "))
                }
            }
            Command::View(view) => {
                self.state().with_symptoms(|input| input.set_view(view));
                format!("View: {view:?}")
            }
            Command::TopK(n) => match self.orchestrator.set_top_k(n) {
                Ok(()) => format!("Showing top {n} predictions"),
                Err(e) => format!("{e}; choose {}", top_k_choices()),
            },

            Command::Predict => {
                let orchestrator = Arc::clone(&self.orchestrator);
                self.spawn_report(async move {
                    match orchestrator.predict().await {
                        Ok(result) => render_result(&ResultView::from_result(&result)),
                        Err(_) => failure_line(&orchestrator, OperationKind::Predict),
                    }
                });
                "Predicting...".to_string()
            }
            Command::Example => {
                let orchestrator = Arc::clone(&self.orchestrator);
                self.spawn_report(async move {
                    match orchestrator.predict_example().await {
                        Ok(result) => {
                            let selection = orchestrator.state().symptoms().text().to_string();
                            format!(
                                "Example symptoms: {selection}\n{}",
                                render_result(&ResultView::from_result(&result))
                            )
                        }
                        Err(_) => failure_line(&orchestrator, OperationKind::PredictExample),
                    }
                });
                "Running example prediction...".to_string()
            }
            Command::Train => {
                let orchestrator = Arc::clone(&self.orchestrator);
                self.spawn_report(async move {
                    match orchestrator.train().await {
                        Ok(summary) => summary
                            .message
                            .unwrap_or_else(|| "Training finished".to_string()),
                        Err(_) => failure_line(&orchestrator, OperationKind::Train),
                    }
                });
                "Training...".to_string()
            }
            Command::Health => {
                let orchestrator = Arc::clone(&self.orchestrator);
                self.spawn_report(async move {
                    let _ = tokio::join!(orchestrator.check_health(), orchestrator.fetch_catalog());
                    let state = orchestrator.state();
                    render_health(&HealthView::new(&state.health(), state.catalog().len()))
                });
                "Checking...".to_string()
            }
            Command::Prescribe(disease) => {
                let orchestrator = Arc::clone(&self.orchestrator);
                self.spawn_report(async move {
                    let outcome = match disease {
                        Some(disease) => orchestrator.generate_prescription(&disease).await,
                        None => orchestrator.prescribe_top().await,
                    };
                    match outcome {
                        Ok(path) => format!("Prescription saved to {}", path.display()),
                        // Details are in the log
                        Err(_) => String::new(),
                    }
                });
                "Generating prescription...".to_string()
            }
            Command::Cancel(kind) => {
                if self.orchestrator.cancel(kind) {
                    format!("{kind} cancelled")
                } else {
                    format!("No {} request pending", kind.to_string().to_lowercase())
                }
            }

            Command::VoiceStart => {
                let voice = Arc::clone(&self.voice);
                self.spawn_report(async move {
                    match voice.start().await {
                        Ok(()) => "Listening... use 'say <words>' then 'voice stop'".to_string(),
                        Err(e) => e.to_string(),
                    }
                });
                String::new()
            }
            Command::VoiceSay(words) => {
                if self.capture.hear(&words) {
                    format!("Transcript: {}", self.voice.transcript())
                } else {
                    "Not listening. Use 'voice start' first.".to_string()
                }
            }
            Command::VoiceStop => {
                let voice = Arc::clone(&self.voice);
                self.spawn_report(async move {
                    match voice.stop().await {
                        Ok(VoiceOutcome::Empty) => "Nothing heard".to_string(),
                        Ok(VoiceOutcome::Played(audio)) => {
                            format!("Playing response ({} bytes, {})", audio.len(), audio.url())
                        }
                        Ok(VoiceOutcome::Discarded) => String::new(),
                        Err(e) => {
                            tracing::debug!(error = %e, "Voice stop failed");
                            String::new()
                        }
                    }
                });
                "Analyzing...".to_string()
            }
            Command::VoiceReplay => {
                let voice = Arc::clone(&self.voice);
                self.spawn_report(async move {
                    match voice.replay().await {
                        Ok(()) => "Replaying response".to_string(),
                        Err(e) => e.to_string(),
                    }
                });
                String::new()
            }
            Command::Status => self.status(),
        };
        (Flow::Continue, out)
    }

    fn status(&self) -> String {
        let state = self.state();
        let mut lines = vec![self.health_line(), self.selection()];
        lines.push(format!(
            "View: {:?} | Top-K: {}",
            state.symptoms().view(),
            state.top_k()
        ));
        for op in state.in_flight() {
            lines.push(format!("Pending: {} (since {})", op.kind, op.started_at));
        }
        if self.voice.phase() != VoicePhase::Idle {
            lines.push(format!("Voice: {:?}", self.voice.phase()));
        }
        for (kind, message) in state.errors() {
            lines.push(format!("{kind} error: {message}"));
        }
        if let Some(result) = state.prediction() {
            lines.push(render_result(&ResultView::from_result(&result)));
        }
        lines.join("\n")
    }

    /// Notices and alerts raised since the last call.
    pub fn pending_notices(&self) -> Vec<String> {
        self.state()
            .drain_notices()
            .into_iter()
            .chain(self.voice.drain_alerts())
            .map(|notice| render_notice(&notice))
            .collect()
    }
}

fn failure_line(orchestrator: &ServiceOrchestrator, kind: OperationKind) -> String {
    let state = orchestrator.state();
    let message = match kind {
        OperationKind::Predict => state.predict_state().error().map(String::from),
        OperationKind::PredictExample => state.example_state().error().map(String::from),
        OperationKind::Train => state.train_state().error().map(String::from),
        _ => None,
    };
    // A superseded request leaves no message of its own
    message.map(|m| format!("Error: {m}")).unwrap_or_default()
}

fn print_block(text: &str) {
    if !text.is_empty() {
        println!("{text}");
    }
}

fn prompt() {
    print!("medipredict> ");
    let _ = std::io::stdout().flush();
}

/// Build a session against the configured services and drive it from stdin.
pub async fn run_console(endpoints: ServiceEndpoints) -> Result<(), Box<dyn std::error::Error>> {
    run_session(endpoints, BufReader::new(tokio::io::stdin())).await
}

/// Drive a session from `input` until it ends or `quit` is entered.
///
/// The startup health and catalog check is reported like any other request,
/// so input is read while it is still pending.
pub async fn run_session<R>(
    endpoints: ServiceEndpoints,
    input: R,
) -> Result<(), Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
{
    let backends = HttpBackends::new(&endpoints)?;
    tracing::info!(
        prediction = %backends.prediction.base_url(),
        prescription = %backends.prescription.base_url(),
        voice = %backends.voice.base_url(),
        "Service endpoints"
    );

    let orchestrator = Arc::new(ServiceOrchestrator::new(
        Arc::new(SessionState::new()),
        Arc::new(backends.prediction),
        Arc::new(backends.prescription),
        DocumentStore::new(config::downloads_dir()),
    ));
    let capture = Arc::new(ScriptedCapture::new());
    let voice = Arc::new(VoiceAssistant::new(
        capture.clone(),
        Arc::new(backends.voice),
        Arc::new(CommandPlayer::from_env()),
    ));
    let (console, mut reports) = Console::new(Arc::clone(&orchestrator), voice, capture);

    println!("{APP_NAME} v{APP_VERSION}. Type 'help' for commands.");
    print_block(&console.execute(Command::Health).1);

    let mut lines = input.lines();
    prompt();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let (flow, out) = console.execute(parse_command(&line));
                print_block(&out);
                for notice in console.pending_notices() {
                    println!("{notice}");
                }
                if flow == Flow::Quit {
                    break;
                }
                prompt();
            }
            Some(report) = reports.recv() => {
                println!();
                print_block(&report);
                for notice in console.pending_notices() {
                    println!("{notice}");
                }
                prompt();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockBackend;
    use crate::voice::SilentPlayer;

    struct Rig {
        console: Console,
        reports: mpsc::UnboundedReceiver<String>,
        mock: Arc<MockBackend>,
        _downloads: tempfile::TempDir,
    }

    fn rig() -> Rig {
        let mock = Arc::new(MockBackend::healthy());
        let downloads = tempfile::tempdir().unwrap();
        let orchestrator = Arc::new(ServiceOrchestrator::new(
            Arc::new(SessionState::new()),
            mock.clone(),
            mock.clone(),
            DocumentStore::new(downloads.path()),
        ));
        let capture = Arc::new(ScriptedCapture::new());
        let voice = Arc::new(VoiceAssistant::new(
            capture.clone(),
            mock.clone(),
            Arc::new(SilentPlayer::new()),
        ));
        let (console, reports) = Console::new(orchestrator, voice, capture);
        Rig {
            console,
            reports,
            mock,
            _downloads: downloads,
        }
    }

    fn run(rig: &Rig, line: &str) -> String {
        rig.console.execute(parse_command(line)).1
    }

    #[test]
    fn parse_keeps_argument_case_and_spacing() {
        assert_eq!(
            parse_command("ADD  Joint Pain "),
            Command::Add("Joint Pain".into())
        );
        assert_eq!(
            parse_command("text fever, cough"),
            Command::Text("fever, cough".into())
        );
        assert_eq!(parse_command("   "), Command::Empty);
    }

    #[test]
    fn parse_operations() {
        assert_eq!(parse_command("topk 10"), Command::TopK(10));
        assert_eq!(
            parse_command("cancel predict"),
            Command::Cancel(OperationKind::Predict)
        );
        assert_eq!(parse_command("voice stop"), Command::VoiceStop);
        assert_eq!(parse_command("symptoms"), Command::Catalog(None));
        assert_eq!(
            parse_command("prescribe Common Cold"),
            Command::Prescribe(Some("Common Cold".into()))
        );
        assert!(matches!(parse_command("topk many"), Command::Invalid(_)));
        assert!(matches!(parse_command("add"), Command::Invalid(_)));
        assert!(matches!(parse_command("frobnicate"), Command::Invalid(_)));
    }

    #[tokio::test]
    async fn selection_commands_keep_text_in_sync() {
        let r = rig();
        assert_eq!(run(&r, "add fever"), "Selected (1): fever");
        assert_eq!(run(&r, "add cough"), "Selected (2): fever, cough");
        assert_eq!(run(&r, "remove fever"), "Selected (1): cough");
        assert_eq!(run(&r, "remove rash"), "'rash' is not selected");
        assert_eq!(run(&r, "clear"), "No symptoms selected");
    }

    #[tokio::test]
    async fn predict_reports_ranked_rows() {
        let mut r = rig();
        run(&r, "add fever");
        assert_eq!(run(&r, "predict"), "Predicting...");

        let report = r.reports.recv().await.unwrap();
        assert!(report.contains("#1"));
        assert!(report.contains("Flu"));
        assert!(report.contains("82.0%"));
        assert!(report.contains("Type 'prescribe'"));
    }

    #[tokio::test]
    async fn empty_predict_reports_validation_message() {
        let mut r = rig();
        run(&r, "predict");
        let report = r.reports.recv().await.unwrap();
        assert_eq!(report, "Error: Please select at least one symptom");
        assert_eq!(r.mock.predict_calls(), 0);
    }

    #[tokio::test]
    async fn train_raises_info_notice() {
        let mut r = rig();
        run(&r, "train");
        r.reports.recv().await.unwrap();
        assert_eq!(
            r.console.pending_notices(),
            vec!["[info] Model trained successfully!".to_string()]
        );
    }

    #[tokio::test]
    async fn voice_round_trip_through_console() {
        let mut r = rig();
        run(&r, "voice start");
        r.reports.recv().await.unwrap();
        assert_eq!(run(&r, "say chest pain"), "Transcript: chest pain");

        run(&r, "voice stop");
        let report = r.reports.recv().await.unwrap();
        assert!(report.starts_with("Playing response"));
        assert_eq!(r.mock.last_voice_text().as_deref(), Some("chest pain"));
    }

    #[tokio::test]
    async fn failed_prescription_stays_out_of_status() {
        let mut r = rig();
        r.mock
            .set_prescription(Err(crate::client::ServiceError::Application(None)));
        run(&r, "prescribe Flu");
        assert_eq!(r.reports.recv().await.unwrap(), "");

        assert!(!run(&r, "status").contains("Prescription"));
        assert!(r.console.pending_notices().is_empty());
    }

    #[tokio::test]
    async fn cancel_health_while_check_is_pending() {
        let mut r = rig();
        let gate = Arc::new(tokio::sync::Notify::new());
        r.mock.gate_health(gate.clone());
        assert_eq!(run(&r, "health"), "Checking...");
        while !r.console.state().is_loading(OperationKind::HealthCheck) {
            tokio::task::yield_now().await;
        }

        assert_eq!(run(&r, "add fever"), "Selected (1): fever");
        assert_eq!(run(&r, "cancel health"), "Health check cancelled");
        gate.notify_one();
        let report = r.reports.recv().await.unwrap();
        assert!(report.starts_with("API: Checking"), "got {report}");
    }

    #[tokio::test]
    async fn catalog_search_switches_view() {
        let r = rig();
        r.console.orchestrator.fetch_catalog().await.unwrap();
        assert_eq!(run(&r, "symptoms HEAD"), "1 symptom(s): headache");
        assert_eq!(r.console.state().symptoms().view(), ActiveView::Symptoms);
        run(&r, "add headache");
        assert_eq!(r.console.state().symptoms().view(), ActiveView::Predict);
    }

    #[tokio::test]
    async fn invalid_top_k_lists_choices() {
        let r = rig();
        assert_eq!(
            run(&r, "topk 7"),
            "Unsupported number of predictions: 7; choose 3|5|10"
        );
    }

    #[test]
    fn health_line_before_first_check() {
        let view = HealthView::new(&crate::models::HealthStatus::unknown(), 0);
        assert_eq!(
            render_health(&view),
            "API: Checking | Diseases: 0 | Features: 0 | Model: not trained | Symptoms available: 0"
        );
    }
}

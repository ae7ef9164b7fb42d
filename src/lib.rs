pub mod catalog;
pub mod client;
pub mod config;
pub mod console;
pub mod models;
pub mod orchestrator;
pub mod presentation;
pub mod request_state;
pub mod resources;
pub mod session;
pub mod symptoms;
pub mod voice;

use tracing_subscriber::EnvFilter;

/// Entry point of the `medipredict` binary.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let endpoints = config::ServiceEndpoints::from_env();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(console::run_console(endpoints))
}

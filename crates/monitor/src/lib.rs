//! Fatigue Monitor
//!
//! Console controller for a live fatigue-detection session: opens the
//! backend camera stream, polls detection counters onto a display board,
//! and runs the reset protocol on demand.

pub mod config;
pub mod console;
pub mod session;

pub use crate::config::MonitorConfig;
pub use session::{MonitorSession, SessionStatus};

use crate::config::LoggingConfig;
use console::{
    render_status, spawn_board_printer, stdin_lines, Command, ConsoleNotifier, SharedInput,
    StdinConfirm, HELP,
};
use detector_client::{BackendError, DetectorBackend, HttpBackend};
use reset_coordinator::{Confirm, ResetOutcome};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncBufRead;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No detection model configured and the backend reported none")]
    NoModel,

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Initialize logging. `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<(), MonitorError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| MonitorError::Logging(e.to_string()))
}

async fn next_line<R: AsyncBufRead + Unpin>(input: &SharedInput<R>) -> std::io::Result<Option<String>> {
    input.lock().await.next_line().await
}

/// Resolves on the first Ctrl-C. If the handler cannot be installed it
/// never resolves, so the session still ends on `quit` or end of input.
async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupted, shutting down"),
        Err(e) => {
            warn!("Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Run an interactive session against the configured backend until
/// `quit`, end of input, or Ctrl-C.
pub async fn run(config: MonitorConfig) -> Result<(), MonitorError> {
    let backend = Arc::new(
        HttpBackend::new(&config.backend.base_url)?.with_timeout(config.backend.request_timeout()),
    );
    let console = Arc::new(ConsoleNotifier::new());
    let session = MonitorSession::new(
        backend,
        config.session.context(),
        config.polling.clone(),
        config.restart,
        console.clone(),
    );

    match session.resolve_model().await {
        Ok(model) => info!("Detection model: {}", model),
        Err(e) => warn!("{}; the camera stream will not open", e),
    }
    session.start().await;

    let printer = spawn_board_printer(session.board(), config.polling.interval());
    println!("{}", HELP);
    let result = command_loop(&session, &console, stdin_lines(), ctrl_c()).await;

    printer.abort();
    session.stop().await;
    info!("Monitor session closed");
    result
}

/// Read and run commands until `quit`, end of input, or `shutdown`
/// resolves. `shutdown` is raced against both the prompt and the running
/// command, so it also interrupts a reset or stop in progress.
pub async fn command_loop<B, R, S>(
    session: &MonitorSession<B>,
    console: &ConsoleNotifier,
    input: SharedInput<R>,
    shutdown: S,
) -> Result<(), MonitorError>
where
    B: DetectorBackend,
    R: AsyncBufRead + Unpin + Send,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let confirm = StdinConfirm::new(Arc::clone(&input));

    loop {
        let line = tokio::select! {
            line = next_line(&input) => line?,
            _ = &mut shutdown => return Ok(()),
        };
        let Some(line) = line else {
            info!("End of input");
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let Some(command) = Command::parse(&line) else {
            println!("Unknown command: {} ({})", line.trim(), HELP);
            continue;
        };
        if command == Command::Quit {
            return Ok(());
        }

        tokio::select! {
            _ = execute(session, console, &confirm, command) => {}
            _ = &mut shutdown => {
                warn!("Interrupted while running {:?}", command);
                return Ok(());
            }
        }
    }
}

async fn execute<B: DetectorBackend, C: Confirm>(
    session: &MonitorSession<B>,
    console: &ConsoleNotifier,
    confirm: &C,
    command: Command,
) {
    match command {
        Command::Start => session.start().await,
        Command::Stop => session.stop().await,
        Command::Reset => match session.reset(confirm).await {
            Ok(ResetOutcome::Cancelled) => println!("Reset cancelled"),
            Ok(outcome) => info!("Reset finished: {:?}", outcome),
            Err(e) => warn!("Reset did not complete: {}", e),
        },
        Command::Status => println!("{}", render_status(&session.status().await)),
        Command::Models => match session.models().await {
            Ok(reply) if reply.success => {
                for model in reply.models {
                    println!(
                        "  {} ({:.2} MB)",
                        model.name,
                        model.size_mb.unwrap_or_default()
                    );
                }
            }
            Ok(reply) => println!(
                "Model list unavailable: {}",
                reply.message.unwrap_or_default()
            ),
            Err(e) => println!("Model list request failed: {}", e),
        },
        Command::Log => {
            for entry in console.entries() {
                println!("{}", entry.line());
            }
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
}

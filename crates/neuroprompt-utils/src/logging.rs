//! Logging and observability setup for neuroprompt
//!
//! Initialization is an explicit call made by the binary; library crates only
//! emit events through `tracing` macros and the helpers below.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{Level, Subscriber, error, info, span, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        self,
        format::{DefaultFields, FmtSpan, Format},
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::redaction::redact_secrets;

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line events
    #[default]
    Compact,
    /// One JSON object per event, for log shippers
    Json,
}

/// Check if colored output should be used.
///
/// Returns true only if stderr is a terminal and `NO_COLOR` is not set.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Build the filter used when `RUST_LOG` is not set.
fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("neuroprompt=debug,info")
            } else {
                EnvFilter::try_new("neuroprompt=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Directory the per-run log files go to, relative to the working directory
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Per-run log file path: `<dir>/NeuroPrompt_<YYYYMMDD-HHMMSS>.log`
#[must_use]
pub fn default_log_file(dir: &Utf8Path) -> Utf8PathBuf {
    dir.join(format!(
        "NeuroPrompt_{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ))
}

/// Open a log file for appending, creating missing parent directories.
///
/// # Errors
///
/// Returns the I/O error if the directory or file cannot be created.
pub fn open_log_file(path: &Utf8Path) -> std::io::Result<Arc<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Arc::new(file))
}

/// Plain-text layer writing every event to `file`, without ANSI colors
#[must_use]
pub fn file_layer<S>(file: Arc<File>) -> fmt::Layer<S, DefaultFields, Format, Arc<File>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file)
}

/// Initialize the tracing subscriber for structured logging.
///
/// `RUST_LOG` always wins over the verbosity flag. Events go to stderr so that
/// the generated prompt on stdout stays pipeable. With `log_file`, the same
/// events are also appended to that file as plain text.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a global subscriber
/// is already installed.
pub fn init_tracing(
    verbose: bool,
    format: LogFormat,
    log_file: Option<&Utf8Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = default_filter(verbose);
    let file = log_file.map(open_log_file).transpose()?;

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file.clone().map(file_layer))
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
        LogFormat::Compact if verbose => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file.clone().map(file_layer))
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(use_color())
                        .with_span_events(FmtSpan::CLOSE)
                        .with_writer(std::io::stderr)
                        .compact(),
                )
                .try_init()?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file.clone().map(file_layer))
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(use_color())
                        .with_writer(std::io::stderr)
                        .compact(),
                )
                .try_init()?;
        }
    }

    if let Some(path) = log_file {
        info!(path = %path, "Writing log file");
    }
    Ok(())
}

/// Create a span for one stage execution
#[must_use]
pub fn stage_span(run_id: &str, stage: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "stage_execution",
        run_id = %run_id,
        stage = %stage,
    )
}

/// Log stage start with its dependency list
pub fn log_stage_start(run_id: &str, stage: &str, dependencies: &[String]) {
    info!(
        run_id = %run_id,
        stage = %stage,
        dependencies = ?dependencies,
        "Starting stage"
    );
}

/// Log stage completion with duration and artifact size
pub fn log_stage_complete(run_id: &str, stage: &str, duration_ms: u128, artifact_bytes: usize) {
    info!(
        run_id = %run_id,
        stage = %stage,
        duration_ms = %duration_ms,
        artifact_bytes = artifact_bytes,
        "Stage completed"
    );
}

/// Log stage failure with context.
///
/// Error messages are redacted to prevent secrets from appearing in logs.
pub fn log_stage_error(run_id: &str, stage: &str, error: &str, duration_ms: u128) {
    let sanitized_error = redact_secrets(error);

    error!(
        run_id = %run_id,
        stage = %stage,
        duration_ms = %duration_ms,
        error = %sanitized_error,
        "Stage failed"
    );
}

/// Log one failed provider attempt inside a resilient completion.
pub fn log_provider_failure(provider: &str, attempt: usize, max_attempts: usize, error: &str) {
    let sanitized_error = redact_secrets(error);

    warn!(
        provider = %provider,
        attempt = attempt,
        max_attempts = max_attempts,
        error = %sanitized_error,
        "Provider attempt failed, marking unavailable"
    );
}

//! CLI entry point
//!
//! `run()` owns all user-facing output, including errors. It returns the exit
//! code to use on failure; main.rs only maps it to the process exit.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::future::Future;
use std::io::{self, BufRead, Write};
use tracing::{debug, info, warn};

use super::args::Cli;
use crate::{
    CancelFlag, Config, ExitCode, LogFormat, NeuroPromptError, Orchestrator, PipelineFailure,
    PipelineOutcome, init_tracing, write_file_atomic,
};
use neuroprompt_utils::logging::{DEFAULT_LOG_DIR, default_log_file};

const DIVIDER: &str = "==================================================";

/// Parse arguments, run the pipeline, print the result.
///
/// # Errors
///
/// Returns the exit code matching the failure after printing it.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    // A missing .env file is normal
    let dotenv = dotenvy::dotenv();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    let log_file = log_file_path(&cli);
    if let Err(e) = init_tracing(cli.verbose, format, log_file.as_deref()) {
        eprintln!("Warning: failed to initialize logging: {e}");
        if log_file.is_some() {
            let _ = init_tracing(cli.verbose, format, None);
        }
    }
    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    let config = Config::discover(&cli.to_cli_args()).map_err(|e| report(&e.into()))?;
    debug!(config = ?config.effective_config(), "Effective configuration");

    let user_input = match &cli.input {
        Some(input) => input.clone(),
        None => read_input().map_err(|e| report(&e))?,
    };
    if user_input.trim().is_empty() {
        return Err(report(&NeuroPromptError::InvalidInput(
            "the prompt request is empty".to_string(),
        )));
    }

    let orchestrator = Orchestrator::from_config(config).map_err(|e| report(&e.into()))?;

    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        eprintln!("✗ Failed to create async runtime: {e}");
        ExitCode::INTERNAL
    })?;

    let outcome = rt.block_on(async {
        let interrupts = wait_for_interrupts(orchestrator.cancel_handle(), tokio::signal::ctrl_c);
        tokio::select! {
            outcome = orchestrator.run_pipeline(user_input.trim()) => Some(outcome),
            () = interrupts => None,
        }
    });
    let Some(outcome) = outcome else {
        eprintln!("✗ Interrupted twice, abandoning the in-flight request");
        return Err(ExitCode::CANCELLED);
    };

    match outcome {
        Ok(outcome) => {
            print_outcome(&outcome);
            if let Some(path) = &cli.output {
                save_output(path, &outcome.final_prompt)?;
            }
            Ok(())
        }
        Err(failure) => Err(report_failure(failure)),
    }
}

fn log_file_path(cli: &Cli) -> Option<Utf8PathBuf> {
    if cli.no_log_file {
        return None;
    }
    match &cli.log_file {
        Some(path) => match Utf8PathBuf::from_path_buf(path.clone()) {
            Ok(path) => Some(path),
            Err(path) => {
                eprintln!("Warning: log file path is not valid UTF-8: {}", path.display());
                None
            }
        },
        None => Some(default_log_file(Utf8Path::new(DEFAULT_LOG_DIR))),
    }
}

/// Resolves after the second interrupt.
///
/// The first interrupt sets `cancel`, so the executor stops before the next
/// stage. If the signal source fails, this never resolves.
async fn wait_for_interrupts<F, Fut>(cancel: CancelFlag, mut next_signal: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if next_signal().await.is_err() {
        return std::future::pending().await;
    }
    warn!("Interrupt received, stopping before the next stage (interrupt again to abort)");
    cancel.cancel();

    if next_signal().await.is_err() {
        return std::future::pending().await;
    }
    warn!("Second interrupt received, aborting the run");
}

fn read_input() -> Result<String, NeuroPromptError> {
    let mut stdout = io::stdout();
    write!(stdout, "Enter your prompt request: ")?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_outcome(outcome: &PipelineOutcome) {
    println!("\n{DIVIDER}");
    println!("GENERATED PROMPT:");
    println!("{DIVIDER}");
    println!("{}", outcome.final_prompt);
    println!("{DIVIDER}\n");

    info!(
        run_id = %outcome.run_id,
        stages = outcome.stage_artifacts.len(),
        final_path = ?outcome.final_path,
        "Prompt generated"
    );
}

fn save_output(path: &std::path::Path, content: &str) -> Result<(), ExitCode> {
    let target = Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(|p| {
        report(&NeuroPromptError::InvalidInput(format!(
            "output path is not valid UTF-8: {}",
            p.display()
        )))
    })?;

    match write_file_atomic(&target, content) {
        Ok(_) => {
            info!(path = %target, "Prompt saved");
            println!("Prompt saved to {target}");
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Error saving prompt to {target}: {e:#}");
            Err(ExitCode::INTERNAL)
        }
    }
}

fn report(err: &NeuroPromptError) -> ExitCode {
    eprintln!("{}", err.display_for_user());
    err.to_exit_code()
}

fn report_failure(failure: PipelineFailure) -> ExitCode {
    let PipelineFailure {
        run_id,
        error,
        completed,
    } = failure;

    if !completed.is_empty() {
        let stages: Vec<&str> = completed.iter().map(|a| a.stage.as_str()).collect();
        eprintln!("Completed stages kept from run {run_id}: {}", stages.join(", "));
    }
    report(&NeuroPromptError::Pipeline(error))
}

//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::CliArgs;

/// neuroprompt - research, generate, critique and optimize a prompt
#[derive(Debug, Parser)]
#[command(name = "neuroprompt")]
#[command(about = "Generate an optimized prompt through a research, generate, critique, optimize pipeline")]
#[command(long_about = r#"
neuroprompt turns a short request into a finished prompt. Four stages run in
dependency order against OpenRouter, falling back through the configured models
when one fails:

  research ──> generate ──> critique ──> optimize
                   └────────────────────────^

Every stage's output is written to the artifacts directory before the next
stage starts, so a failed run keeps what it already produced.

EXAMPLES:
  neuroprompt "Write a product launch email for a budgeting app"
  neuroprompt "Explain vector clocks to new engineers" -o prompt.txt
  neuroprompt --model mistralai/mistral-7b-instruct:free --fallback-model google/gemma-7b-it:free "Summarize this RFC"

CONFIGURATION:
  Precedence: CLI flags > environment > config file > defaults
  The config file is $NEUROPROMPT_HOME/config.toml or the nearest .neuroprompt/config.toml
  A .env file in the current directory is loaded first (OPENROUTER_API_KEY, OPENROUTER_MODEL_ID)

LOGGING:
  Each run also appends its log to logs/NeuroPrompt_<YYYYMMDD-HHMMSS>.log
  (--log-file to choose the path, --no-log-file to disable)
  Press Ctrl-C once to stop after the current stage, twice to abort immediately
"#)]
#[command(version)]
pub struct Cli {
    /// The prompt request to process (read from stdin when omitted)
    pub input: Option<String>,

    /// Also write the generated prompt to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Write the run log to this file instead of logs/NeuroPrompt_<timestamp>.log
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Do not write a log file
    #[arg(long, conflicts_with = "log_file")]
    pub no_log_file: bool,

    /// Path to configuration file (overrides discovery)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Primary model id
    #[arg(long)]
    pub model: Option<String>,

    /// Fallback model id, tried in the order given (repeatable)
    #[arg(long = "fallback-model", value_name = "MODEL")]
    pub fallback_models: Vec<String>,

    /// Sampling temperature for every stage without an override
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum completion tokens for every stage without an override
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub request_timeout: Option<u64>,

    /// Per-stage timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub stage_timeout: Option<u64>,

    /// Directory stage artifacts are written to
    #[arg(long)]
    pub artifacts_dir: Option<String>,

    /// Chat-completions endpoint
    #[arg(long)]
    pub base_url: Option<String>,

    /// Run independent stages of the same rank concurrently
    #[arg(long)]
    pub parallel: bool,
}

impl Cli {
    /// Configuration overrides carried by the command line
    #[must_use]
    pub fn to_cli_args(&self) -> CliArgs {
        CliArgs {
            config_path: self.config.clone(),
            model: self.model.clone(),
            fallback_models: self.fallback_models.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            request_timeout_secs: self.request_timeout,
            stage_timeout_secs: self.stage_timeout,
            artifacts_dir: self.artifacts_dir.clone(),
            base_url: self.base_url.clone(),
            verbose: self.verbose.then_some(true),
            rank_concurrency: self.parallel.then_some(true),
        }
    }
}

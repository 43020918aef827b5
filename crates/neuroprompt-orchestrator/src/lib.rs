//! Pipeline entry point for neuroprompt
//!
//! [`Orchestrator`] wires the fixed stage graph
//!
//! ```text
//! research ──> generate ──> critique ──> optimize
//!                  └────────────────────────^
//! ```
//!
//! over the pipeline executor and the resilient completion client, and
//! returns the optimize stage's artifact as the final prompt.
//!
//! ```rust,no_run
//! use neuroprompt_config::{CliArgs, Config};
//! use neuroprompt_orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::discover(&CliArgs::default())?;
//!     let orchestrator = Orchestrator::from_config(config)?;
//!
//!     let outcome = orchestrator.run_pipeline("Write a product launch email").await?;
//!     println!("{}", outcome.final_prompt);
//!     Ok(())
//! }
//! ```

mod orchestrator;

pub use orchestrator::{Orchestrator, PipelineOutcome};

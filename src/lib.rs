//! neuroprompt - prompt generation pipeline with provider fallback
//!
//! A request flows through four dependent stages (research, generate,
//! critique, optimize). Each stage asks a [`ResilientClient`] for one
//! completion, rotating through the configured OpenRouter models when a model
//! fails. Stage outputs are persisted as artifacts before dependent stages
//! start.
//!
//! neuroprompt can be used in two ways:
//! - **CLI**: `neuroprompt "Write a product launch email"`
//! - **Library**: build an [`Orchestrator`] and call
//!   [`Orchestrator::run_pipeline`]
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use neuroprompt::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::builder()
//!         .primary_model("anthropic/claude-3-haiku:free")
//!         .fallback_model("mistralai/mistral-7b-instruct:free")
//!         .artifacts_dir("data")
//!         .build()?;
//!
//!     let orchestrator = Orchestrator::from_config(config)?;
//!     let outcome = orchestrator.run_pipeline("Explain vector clocks").await?;
//!     println!("{}", outcome.final_prompt);
//!     Ok(())
//! }
//! ```
//!
//! # Building blocks
//!
//! - [`ProviderRegistry`] and [`ResilientClient`]: provider selection and
//!   bounded fallback
//! - [`PipelineGraph`] and [`PipelineExecutor`]: validated stage graphs run in
//!   topological order
//! - [`ArtifactStore`]: where stage outputs are persisted

pub mod cli;

pub use neuroprompt_config::{CliArgs, Config, ConfigBuilder, ConfigSource};
pub use neuroprompt_llm::{
    CompletionRequest, LlmBackend, LlmResult, Message, OpenRouterBackend, ProviderRegistry,
    ResilientClient, Role,
};
pub use neuroprompt_orchestrator::{Orchestrator, PipelineOutcome};
pub use neuroprompt_pipeline::{
    Artifact, ArtifactStore, CancelFlag, FsArtifactStore, InMemoryArtifactStore, PipelineExecutor,
    PipelineFailure, PipelineGraph, PipelineRun, Stage, StageInputs,
};
pub use neuroprompt_stages::{CompletionStage, DefaultTemplates, StageTemplates};
pub use neuroprompt_utils::atomic_write::write_file_atomic;
pub use neuroprompt_utils::error::{
    ConfigError, LlmError, NeuroPromptError, PipelineError, ProvidersExhausted, UserFriendlyError,
};
pub use neuroprompt_utils::exit_codes::ExitCode;
pub use neuroprompt_utils::logging::{LogFormat, init_tracing};

//! Configuration management for neuroprompt
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > environment > file > defaults. TOML configuration files may carry
//! `[defaults]`, `[llm]` and `[stages.<name>]` sections.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

use camino::Utf8PathBuf;
use std::time::Duration;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use discovery::{FALLBACK_MODELS_ENV, HOME_ENV, MODEL_ENV};
pub use model::*;
pub use neuroprompt_utils::types::ConfigSource;
pub use validation::{MAX_TIMEOUT_SECS, MAX_TOKENS_LIMIT};

impl Config {
    /// Temperature for a stage: `[stages.<name>]` override, else the global default.
    #[must_use]
    pub fn temperature_for_stage(&self, stage: &str) -> f32 {
        self.stages
            .get(stage)
            .and_then(|s| s.temperature)
            .or(self.defaults.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// Completion length limit for a stage, with the same precedence as
    /// [`Config::temperature_for_stage`].
    #[must_use]
    pub fn max_tokens_for_stage(&self, stage: &str) -> u32 {
        self.stages
            .get(stage)
            .and_then(|s| s.max_tokens)
            .or(self.defaults.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.defaults
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.defaults.stage_timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn artifacts_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(
            self.defaults
                .artifacts_dir
                .as_deref()
                .unwrap_or(DEFAULT_ARTIFACTS_DIR),
        )
    }

    /// Provider identifiers in priority order: the primary, then each fallback.
    #[must_use]
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids = vec![
            self.llm
                .primary_model
                .clone()
                .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
        ];
        ids.extend(self.llm.fallback_models.iter().flatten().cloned());
        ids
    }

    #[must_use]
    pub fn api_key_env(&self) -> &str {
        self.llm.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.defaults.verbose.unwrap_or(false)
    }

    #[must_use]
    pub fn rank_concurrency(&self) -> bool {
        self.defaults.rank_concurrency.unwrap_or(false)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Config {
    /// Create a minimal Config for testing purposes
    ///
    /// Built-in defaults only; no discovery, no environment.
    pub fn minimal_for_testing() -> Self {
        Config {
            defaults: Defaults::default(),
            llm: LlmConfig::default(),
            stages: StagesConfig::default(),
            source_attribution: std::collections::HashMap::new(),
            config_path: None,
        }
    }
}

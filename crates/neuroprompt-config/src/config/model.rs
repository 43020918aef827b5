use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use neuroprompt_utils::types::ConfigSource;

/// Default sampling temperature for every stage
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default completion length limit
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default directory for stage artifacts
pub const DEFAULT_ARTIFACTS_DIR: &str = "data";

/// Default provider backend
pub const DEFAULT_PROVIDER: &str = "openrouter";

/// Default environment variable holding the API key
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Default primary model
pub const DEFAULT_PRIMARY_MODEL: &str = "anthropic/claude-3-haiku:free";

/// Configuration for a neuroprompt run.
///
/// `Config` provides hierarchical configuration with discovery and precedence:
/// CLI arguments > environment > config file > built-in defaults.
///
/// # Discovery
///
/// Use [`Config::discover()`] for CLI-like behavior that:
/// - Uses `--config <path>` when given
/// - Else respects the `NEUROPROMPT_HOME` environment variable
/// - Else searches for `.neuroprompt/config.toml` upward from the current directory
/// - Applies built-in defaults for unspecified values
///
/// # Configuration File Format
///
/// ```toml
/// [defaults]
/// temperature = 0.7
/// max_tokens = 1000
/// request_timeout_secs = 60
/// artifacts_dir = "data"
///
/// [llm]
/// provider = "openrouter"
/// primary_model = "anthropic/claude-3-haiku:free"
/// fallback_models = ["mistralai/mistral-7b-instruct:free"]
///
/// [stages.critique]
/// temperature = 0.2
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Default values for request parameters and run layout.
    pub defaults: Defaults,
    /// Provider configuration.
    pub llm: LlmConfig,
    /// Per-stage overrides.
    pub stages: StagesConfig,
    /// Source attribution for each setting.
    pub source_attribution: HashMap<String, ConfigSource>,
    /// Config file that was loaded, if any.
    pub config_path: Option<PathBuf>,
}

/// Default request parameters and run layout
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Defaults {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    /// Upper bound on a whole stage, including every provider attempt. Unset means no bound.
    pub stage_timeout_secs: Option<u64>,
    pub artifacts_dir: Option<String>,
    pub verbose: Option<bool>,
    /// Run mutually independent stages of one rank concurrently.
    pub rank_concurrency: Option<bool>,
}

/// Completion provider configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LlmConfig {
    pub provider: Option<String>,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    /// First provider tried for every request.
    pub primary_model: Option<String>,
    /// Fallbacks, in priority order.
    pub fallback_models: Option<Vec<String>>,
    /// `HTTP-Referer` header sent to OpenRouter.
    pub referer: Option<String>,
    /// `X-Title` header sent to OpenRouter.
    pub title: Option<String>,
}

/// Per-stage request overrides
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct StageConfig {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Stage-specific configuration section
///
/// ```toml
/// [stages.generate]
/// max_tokens = 1500
///
/// [stages.critique]
/// temperature = 0.2
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StagesConfig {
    pub research: Option<StageConfig>,
    pub generate: Option<StageConfig>,
    pub critique: Option<StageConfig>,
    pub optimize: Option<StageConfig>,
}

impl StagesConfig {
    /// Look up the override block for a stage name
    #[must_use]
    pub fn get(&self, stage: &str) -> Option<&StageConfig> {
        match stage {
            "research" => self.research.as_ref(),
            "generate" => self.generate.as_ref(),
            "critique" => self.critique.as_ref(),
            "optimize" => self.optimize.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn entries(&self) -> [(&'static str, Option<&StageConfig>); 4] {
        [
            ("research", self.research.as_ref()),
            ("generate", self.generate.as_ref()),
            ("critique", self.critique.as_ref()),
            ("optimize", self.optimize.as_ref()),
        ]
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            stage_timeout_secs: None,
            artifacts_dir: Some(DEFAULT_ARTIFACTS_DIR.to_string()),
            verbose: Some(false),
            rank_concurrency: Some(false),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Some(DEFAULT_PROVIDER.to_string()),
            api_key_env: Some(DEFAULT_API_KEY_ENV.to_string()),
            base_url: None,
            primary_model: Some(DEFAULT_PRIMARY_MODEL.to_string()),
            fallback_models: Some(Vec::new()),
            referer: None,
            title: None,
        }
    }
}

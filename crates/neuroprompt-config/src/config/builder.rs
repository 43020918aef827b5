use std::collections::HashMap;
use std::time::Duration;

use neuroprompt_utils::error::ConfigError;

use super::{Config, ConfigSource, Defaults, LlmConfig, StageConfig, StagesConfig};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this to configure a run without environment variables or config
    /// files, for example when embedding the orchestrator or in tests.
    ///
    /// ```rust
    /// use neuroprompt_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .primary_model("anthropic/claude-3-haiku:free")
    ///     .fallback_model("mistralai/mistral-7b-instruct:free")
    ///     .request_timeout(Duration::from_secs(30))
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.provider_ids().len(), 2);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for programmatic configuration.
///
/// All values set via the builder are attributed to
/// [`ConfigSource::Programmatic`]; everything else keeps its default.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    primary_model: Option<String>,
    fallback_models: Option<Vec<String>>,
    base_url: Option<String>,
    api_key_env: Option<String>,
    referer: Option<String>,
    title: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    request_timeout: Option<Duration>,
    stage_timeout: Option<Duration>,
    artifacts_dir: Option<String>,
    rank_concurrency: Option<bool>,
    stages: StagesConfig,
    stages_set: bool,
}

impl ConfigBuilder {
    /// Create a new `ConfigBuilder` with no values set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary model id.
    #[must_use]
    pub fn primary_model(mut self, model: impl Into<String>) -> Self {
        self.primary_model = Some(model.into());
        self
    }

    /// Replace the fallback model list.
    #[must_use]
    pub fn fallback_models(mut self, models: Vec<String>) -> Self {
        self.fallback_models = Some(models);
        self
    }

    /// Append one fallback model.
    #[must_use]
    pub fn fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_models
            .get_or_insert_with(Vec::new)
            .push(model.into());
        self
    }

    /// Point the OpenRouter backend at another chat-completions URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Name of the environment variable holding the API key.
    #[must_use]
    pub fn api_key_env(mut self, name: impl Into<String>) -> Self {
        self.api_key_env = Some(name.into());
        self
    }

    #[must_use]
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Default sampling temperature (0.0 to 2.0).
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Default completion length limit.
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Bound on each single provider request.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Bound on a whole stage, including every provider attempt.
    #[must_use]
    pub fn stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    /// Directory where stage artifacts and the manifest are written.
    #[must_use]
    pub fn artifacts_dir(mut self, dir: impl Into<String>) -> Self {
        self.artifacts_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn rank_concurrency(mut self, enabled: bool) -> Self {
        self.rank_concurrency = Some(enabled);
        self
    }

    /// Override request parameters for one named stage.
    ///
    /// Unknown stage names are ignored.
    #[must_use]
    pub fn stage(mut self, name: &str, stage: StageConfig) -> Self {
        let slot = match name {
            "research" => &mut self.stages.research,
            "generate" => &mut self.stages.generate,
            "critique" => &mut self.stages.critique,
            "optimize" => &mut self.stages.optimize,
            _ => return self,
        };
        *slot = Some(stage);
        self.stages_set = true;
        self
    }

    /// Build the `Config`, applying defaults for unset values and validating
    /// the result.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut source_attribution = HashMap::new();
        let mut defaults = Defaults::default();
        let mut llm = LlmConfig::default();

        let programmatic = ConfigSource::Programmatic;
        let mut set = |key: &str| {
            source_attribution.insert(key.to_string(), programmatic);
        };

        if let Some(model) = self.primary_model {
            llm.primary_model = Some(model);
            set("primary_model");
        }
        if let Some(models) = self.fallback_models {
            llm.fallback_models = Some(models);
            set("fallback_models");
        }
        if let Some(url) = self.base_url {
            llm.base_url = Some(url);
            set("base_url");
        }
        if let Some(name) = self.api_key_env {
            llm.api_key_env = Some(name);
            set("api_key_env");
        }
        if let Some(referer) = self.referer {
            llm.referer = Some(referer);
            set("referer");
        }
        if let Some(title) = self.title {
            llm.title = Some(title);
            set("title");
        }
        if let Some(t) = self.temperature {
            defaults.temperature = Some(t);
            set("temperature");
        }
        if let Some(m) = self.max_tokens {
            defaults.max_tokens = Some(m);
            set("max_tokens");
        }
        if let Some(timeout) = self.request_timeout {
            defaults.request_timeout_secs = Some(timeout.as_secs());
            set("request_timeout_secs");
        }
        if let Some(timeout) = self.stage_timeout {
            defaults.stage_timeout_secs = Some(timeout.as_secs());
            set("stage_timeout_secs");
        }
        if let Some(dir) = self.artifacts_dir {
            defaults.artifacts_dir = Some(dir);
            set("artifacts_dir");
        }
        if let Some(enabled) = self.rank_concurrency {
            defaults.rank_concurrency = Some(enabled);
            set("rank_concurrency");
        }
        if self.stages_set {
            set("stages");
        }

        let config = Config {
            defaults,
            llm,
            stages: self.stages,
            source_attribution,
            config_path: None,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.defaults.temperature, Some(0.7));
        assert_eq!(config.defaults.max_tokens, Some(1000));
        assert_eq!(
            config.llm.primary_model.as_deref(),
            Some("anthropic/claude-3-haiku:free")
        );
        assert!(config.source_attribution.is_empty());
    }

    #[test]
    fn test_builder_values_are_programmatic() {
        let config = Config::builder()
            .primary_model("A")
            .fallback_model("B")
            .fallback_model("C")
            .stage_timeout(Duration::from_secs(90))
            .build()
            .unwrap();

        assert_eq!(config.provider_ids(), vec!["A", "B", "C"]);
        assert_eq!(config.stage_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(
            config.source_attribution.get("fallback_models"),
            Some(&ConfigSource::Programmatic)
        );
    }

    #[test]
    fn test_builder_validates() {
        let err = Config::builder()
            .primary_model("A")
            .fallback_model("A")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "fallback_models"));
    }

    #[test]
    fn test_builder_stage_override() {
        let config = Config::builder()
            .temperature(0.9)
            .stage(
                "critique",
                StageConfig {
                    temperature: Some(0.2),
                    max_tokens: Some(1500),
                },
            )
            .stage("unknown", StageConfig::default())
            .build()
            .unwrap();

        assert_eq!(config.temperature_for_stage("critique"), 0.2);
        assert_eq!(config.max_tokens_for_stage("critique"), 1500);
        assert_eq!(config.temperature_for_stage("research"), 0.9);
    }
}

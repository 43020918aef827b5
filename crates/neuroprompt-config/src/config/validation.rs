use std::collections::HashSet;

use neuroprompt_utils::error::ConfigError;

use super::{Config, DEFAULT_PROVIDER};

/// Largest completion length accepted from configuration
pub const MAX_TOKENS_LIMIT: u32 = 32_768;

/// Largest request or stage timeout accepted from configuration
pub const MAX_TIMEOUT_SECS: u64 = 3600;

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

fn check_temperature(key: &str, temperature: f32) -> Result<(), ConfigError> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(invalid(
            key,
            format!("{temperature} is outside the range 0.0 to 2.0"),
        ));
    }
    Ok(())
}

fn check_max_tokens(key: &str, max_tokens: u32) -> Result<(), ConfigError> {
    if max_tokens == 0 {
        return Err(invalid(key, "must be greater than 0"));
    }
    if max_tokens > MAX_TOKENS_LIMIT {
        return Err(invalid(
            key,
            format!("exceeds maximum limit of {MAX_TOKENS_LIMIT}"),
        ));
    }
    Ok(())
}

fn check_timeout(key: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 {
        return Err(invalid(key, "must be at least 1 second"));
    }
    if secs > MAX_TIMEOUT_SECS {
        return Err(invalid(
            key,
            format!("exceeds maximum limit of {MAX_TIMEOUT_SECS} seconds (1 hour)"),
        ));
    }
    Ok(())
}

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.defaults.temperature {
            check_temperature("temperature", t)?;
        }
        if let Some(m) = self.defaults.max_tokens {
            check_max_tokens("max_tokens", m)?;
        }
        if let Some(secs) = self.defaults.request_timeout_secs {
            check_timeout("request_timeout_secs", secs)?;
        }
        if let Some(secs) = self.defaults.stage_timeout_secs {
            check_timeout("stage_timeout_secs", secs)?;
        }

        if let Some(dir) = &self.defaults.artifacts_dir
            && dir.trim().is_empty()
        {
            return Err(invalid("artifacts_dir", "must not be empty"));
        }

        for (name, stage) in self.stages.entries() {
            let Some(stage) = stage else { continue };
            if let Some(t) = stage.temperature {
                check_temperature(&format!("stages.{name}.temperature"), t)?;
            }
            if let Some(m) = stage.max_tokens {
                check_max_tokens(&format!("stages.{name}.max_tokens"), m)?;
            }
        }

        if let Some(provider) = &self.llm.provider
            && provider != DEFAULT_PROVIDER
        {
            return Err(invalid(
                "provider",
                format!("unknown provider '{provider}'; supported: {DEFAULT_PROVIDER}"),
            ));
        }

        if let Some(env_name) = &self.llm.api_key_env
            && env_name.trim().is_empty()
        {
            return Err(invalid("api_key_env", "must not be empty"));
        }

        if let Some(url) = &self.llm.base_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(invalid(
                "base_url",
                format!("'{url}' must start with http:// or https://"),
            ));
        }

        let primary = self.llm.primary_model.as_deref().unwrap_or_default();
        if primary.trim().is_empty() {
            return Err(invalid("primary_model", "must not be empty"));
        }

        let mut seen = HashSet::new();
        seen.insert(primary);
        for fallback in self.llm.fallback_models.iter().flatten() {
            if fallback.trim().is_empty() {
                return Err(invalid("fallback_models", "model ids must not be empty"));
            }
            if !seen.insert(fallback.as_str()) {
                return Err(invalid(
                    "fallback_models",
                    format!("model '{fallback}' is listed more than once"),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_of(err: ConfigError) -> String {
        match err {
            ConfigError::InvalidValue { key, .. } => key,
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_minimal_config_is_valid() {
        assert!(Config::minimal_for_testing().validate().is_ok());
    }

    #[test]
    fn test_temperature_bounds() {
        let mut config = Config::minimal_for_testing();
        config.defaults.temperature = Some(2.0);
        assert!(config.validate().is_ok());

        config.defaults.temperature = Some(2.01);
        assert_eq!(key_of(config.validate().unwrap_err()), "temperature");

        config.defaults.temperature = Some(-0.1);
        assert_eq!(key_of(config.validate().unwrap_err()), "temperature");
    }

    #[test]
    fn test_max_tokens_bounds() {
        let mut config = Config::minimal_for_testing();
        config.defaults.max_tokens = Some(0);
        assert_eq!(key_of(config.validate().unwrap_err()), "max_tokens");

        config.defaults.max_tokens = Some(MAX_TOKENS_LIMIT + 1);
        assert_eq!(key_of(config.validate().unwrap_err()), "max_tokens");

        config.defaults.max_tokens = Some(MAX_TOKENS_LIMIT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeout_bounds() {
        let mut config = Config::minimal_for_testing();
        config.defaults.request_timeout_secs = Some(0);
        assert_eq!(key_of(config.validate().unwrap_err()), "request_timeout_secs");

        config.defaults.request_timeout_secs = Some(60);
        config.defaults.stage_timeout_secs = Some(MAX_TIMEOUT_SECS + 1);
        assert_eq!(key_of(config.validate().unwrap_err()), "stage_timeout_secs");
    }

    #[test]
    fn test_stage_override_is_validated_with_qualified_key() {
        let mut config = Config::minimal_for_testing();
        config.stages.critique = Some(super::super::StageConfig {
            temperature: Some(3.0),
            max_tokens: None,
        });
        assert_eq!(
            key_of(config.validate().unwrap_err()),
            "stages.critique.temperature"
        );
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("gemini".to_string());
        assert_eq!(key_of(config.validate().unwrap_err()), "provider");
    }

    #[test]
    fn test_duplicate_provider_ids_rejected() {
        let mut config = Config::minimal_for_testing();
        config.llm.primary_model = Some("a/model".to_string());
        config.llm.fallback_models = Some(vec!["b/model".to_string(), "a/model".to_string()]);
        assert_eq!(key_of(config.validate().unwrap_err()), "fallback_models");
    }

    #[test]
    fn test_empty_primary_rejected() {
        let mut config = Config::minimal_for_testing();
        config.llm.primary_model = Some("   ".to_string());
        assert_eq!(key_of(config.validate().unwrap_err()), "primary_model");
    }

    #[test]
    fn test_base_url_scheme_checked() {
        let mut config = Config::minimal_for_testing();
        config.llm.base_url = Some("openrouter.ai/api".to_string());
        assert_eq!(key_of(config.validate().unwrap_err()), "base_url");

        config.llm.base_url = Some("http://127.0.0.1:9000/chat/completions".to_string());
        assert!(config.validate().is_ok());
    }
}

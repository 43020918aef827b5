use std::collections::BTreeMap;

use super::{Config, ConfigSource};

fn source_label(source: Option<&ConfigSource>) -> String {
    source.copied().unwrap_or(ConfigSource::Default).to_string()
}

impl Config {
    /// Get effective configuration as key-value pairs with source attribution.
    ///
    /// The map is ordered so it can be printed directly in `--verbose` output.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add_config = |key: &str, value: Option<String>| {
            if let Some(val) = value {
                let source = source_label(self.source_attribution.get(key));
                config.insert(key.to_string(), (val, source));
            }
        };

        add_config("temperature", self.defaults.temperature.map(|v| v.to_string()));
        add_config("max_tokens", self.defaults.max_tokens.map(|v| v.to_string()));
        add_config(
            "request_timeout_secs",
            self.defaults.request_timeout_secs.map(|v| v.to_string()),
        );
        add_config(
            "stage_timeout_secs",
            self.defaults.stage_timeout_secs.map(|v| v.to_string()),
        );
        add_config("artifacts_dir", self.defaults.artifacts_dir.clone());
        add_config("verbose", self.defaults.verbose.map(|v| v.to_string()));
        add_config(
            "rank_concurrency",
            self.defaults.rank_concurrency.map(|v| v.to_string()),
        );

        add_config("provider", self.llm.provider.clone());
        add_config("api_key_env", self.llm.api_key_env.clone());
        add_config("base_url", self.llm.base_url.clone());
        add_config("primary_model", self.llm.primary_model.clone());
        add_config(
            "fallback_models",
            self.llm.fallback_models.as_ref().map(|m| m.join(", ")),
        );

        config
    }
}

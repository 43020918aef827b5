use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use neuroprompt_utils::error::ConfigError;

use super::{CliArgs, Config, ConfigSource, Defaults, LlmConfig, StagesConfig};

/// Environment variable pointing at a directory holding `config.toml`
pub const HOME_ENV: &str = "NEUROPROMPT_HOME";

/// Environment variable overriding the primary model
pub const MODEL_ENV: &str = "OPENROUTER_MODEL_ID";

/// Environment variable overriding the fallback models (comma separated)
pub const FALLBACK_MODELS_ENV: &str = "NEUROPROMPT_FALLBACK_MODELS";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<TomlDefaults>,
    llm: Option<TomlLlm>,
    stages: Option<StagesConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlDefaults {
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    request_timeout_secs: Option<u64>,
    stage_timeout_secs: Option<u64>,
    artifacts_dir: Option<String>,
    verbose: Option<bool>,
    rank_concurrency: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlLlm {
    provider: Option<String>,
    api_key_env: Option<String>,
    base_url: Option<String>,
    primary_model: Option<String>,
    fallback_models: Option<Vec<String>>,
    referer: Option<String>,
    title: Option<String>,
}

/// Replace `slot` with `value` when present and record where it came from
fn overlay<T>(
    slot: &mut Option<T>,
    value: Option<T>,
    key: &str,
    source: ConfigSource,
    attribution: &mut HashMap<String, ConfigSource>,
) {
    if let Some(v) = value {
        *slot = Some(v);
        attribution.insert(key.to_string(), source);
    }
}

/// Split a comma separated model list, dropping blanks
fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is provided in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("cannot determine current directory: {e}"),
        })?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    ///
    /// This is the path-driven variant used by tests to avoid depending on the
    /// process working directory.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut source_attribution = HashMap::new();

        let mut defaults = Defaults::default();
        let mut llm = LlmConfig::default();
        let mut stages = StagesConfig::default();

        for key in [
            "temperature",
            "max_tokens",
            "request_timeout_secs",
            "artifacts_dir",
            "verbose",
            "rank_concurrency",
            "provider",
            "api_key_env",
            "primary_model",
            "fallback_models",
        ] {
            source_attribution.insert(key.to_string(), ConfigSource::Default);
        }

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir)?,
        };

        if let Some(path) = &config_path {
            tracing::debug!(path = %path.display(), "Loading configuration file");
            let file_config = Self::load_config_file(path)?;
            let src = ConfigSource::Config;
            let attr = &mut source_attribution;

            if let Some(d) = file_config.defaults {
                overlay(&mut defaults.temperature, d.temperature, "temperature", src, attr);
                overlay(&mut defaults.max_tokens, d.max_tokens, "max_tokens", src, attr);
                overlay(
                    &mut defaults.request_timeout_secs,
                    d.request_timeout_secs,
                    "request_timeout_secs",
                    src,
                    attr,
                );
                overlay(
                    &mut defaults.stage_timeout_secs,
                    d.stage_timeout_secs,
                    "stage_timeout_secs",
                    src,
                    attr,
                );
                overlay(&mut defaults.artifacts_dir, d.artifacts_dir, "artifacts_dir", src, attr);
                overlay(&mut defaults.verbose, d.verbose, "verbose", src, attr);
                overlay(
                    &mut defaults.rank_concurrency,
                    d.rank_concurrency,
                    "rank_concurrency",
                    src,
                    attr,
                );
            }

            if let Some(l) = file_config.llm {
                overlay(&mut llm.provider, l.provider, "provider", src, attr);
                overlay(&mut llm.api_key_env, l.api_key_env, "api_key_env", src, attr);
                overlay(&mut llm.base_url, l.base_url, "base_url", src, attr);
                overlay(&mut llm.primary_model, l.primary_model, "primary_model", src, attr);
                overlay(
                    &mut llm.fallback_models,
                    l.fallback_models,
                    "fallback_models",
                    src,
                    attr,
                );
                overlay(&mut llm.referer, l.referer, "referer", src, attr);
                overlay(&mut llm.title, l.title, "title", src, attr);
            }

            if let Some(s) = file_config.stages {
                stages = s;
                attr.insert("stages".to_string(), src);
            }
        }

        // Environment overrides the config file
        overlay(
            &mut llm.primary_model,
            non_empty_env(MODEL_ENV),
            "primary_model",
            ConfigSource::Env,
            &mut source_attribution,
        );
        overlay(
            &mut llm.fallback_models,
            non_empty_env(FALLBACK_MODELS_ENV).map(|raw| parse_model_list(&raw)),
            "fallback_models",
            ConfigSource::Env,
            &mut source_attribution,
        );

        // CLI overrides everything
        let cli = ConfigSource::Cli;
        let attr = &mut source_attribution;
        overlay(&mut llm.primary_model, cli_args.model.clone(), "primary_model", cli, attr);
        if !cli_args.fallback_models.is_empty() {
            llm.fallback_models = Some(cli_args.fallback_models.clone());
            attr.insert("fallback_models".to_string(), cli);
        }
        overlay(&mut defaults.temperature, cli_args.temperature, "temperature", cli, attr);
        overlay(&mut defaults.max_tokens, cli_args.max_tokens, "max_tokens", cli, attr);
        overlay(
            &mut defaults.request_timeout_secs,
            cli_args.request_timeout_secs,
            "request_timeout_secs",
            cli,
            attr,
        );
        overlay(
            &mut defaults.stage_timeout_secs,
            cli_args.stage_timeout_secs,
            "stage_timeout_secs",
            cli,
            attr,
        );
        overlay(
            &mut defaults.artifacts_dir,
            cli_args.artifacts_dir.clone(),
            "artifacts_dir",
            cli,
            attr,
        );
        overlay(&mut llm.base_url, cli_args.base_url.clone(), "base_url", cli, attr);
        overlay(&mut defaults.verbose, cli_args.verbose, "verbose", cli, attr);
        overlay(
            &mut defaults.rank_concurrency,
            cli_args.rank_concurrency,
            "rank_concurrency",
            cli,
            attr,
        );

        let config = Self {
            defaults,
            llm,
            stages,
            source_attribution,
            config_path,
        };

        config.validate()?;

        Ok(config)
    }

    /// Discover the config file location.
    ///
    /// `$NEUROPROMPT_HOME/config.toml` wins when the variable is set and the file
    /// exists. Otherwise the directory tree is walked upward from `start_dir`
    /// looking for `.neuroprompt/config.toml`, stopping at repository root
    /// markers (.git, .hg, .svn) or the filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(home) = non_empty_env(HOME_ENV) {
            let candidate = PathBuf::from(home).join("config.toml");
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }

        let mut current_dir = start_dir.to_path_buf();

        loop {
            let config_path = current_dir.join(".neuroprompt").join("config.toml");
            if config_path.is_file() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    /// Load configuration from a TOML file
    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::InvalidFile(format!("cannot read {}: {e}", path.display()))
            }
        })?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display())))
    }

    /// Discover configuration from environment and filesystem only.
    ///
    /// Equivalent to [`Config::discover`] with no CLI overrides.
    pub fn discover_from_env_and_fs() -> Result<Self, ConfigError> {
        Self::discover(&CliArgs::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_list_trims_and_drops_blanks() {
        assert_eq!(
            parse_model_list(" a/one , ,b/two,"),
            vec!["a/one".to_string(), "b/two".to_string()]
        );
        assert!(parse_model_list(" , ").is_empty());
    }

    #[test]
    fn test_overlay_records_source_only_when_set() {
        let mut attribution = HashMap::new();
        let mut slot = Some(1u32);

        overlay(&mut slot, None, "max_tokens", ConfigSource::Cli, &mut attribution);
        assert_eq!(slot, Some(1));
        assert!(attribution.is_empty());

        overlay(&mut slot, Some(5), "max_tokens", ConfigSource::Cli, &mut attribution);
        assert_eq!(slot, Some(5));
        assert_eq!(attribution.get("max_tokens"), Some(&ConfigSource::Cli));
    }
}

use std::path::PathBuf;

/// CLI arguments that can override configuration.
///
/// Every field is optional; `None` means "not given on the command line" and
/// leaves the environment, config file or default value in place.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub model: Option<String>,
    pub fallback_models: Vec<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub stage_timeout_secs: Option<u64>,
    pub artifacts_dir: Option<String>,
    pub base_url: Option<String>,
    pub verbose: Option<bool>,
    pub rank_concurrency: Option<bool>,
}

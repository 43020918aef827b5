//! Completion backends and provider fallback for neuroprompt
//!
//! Backends implement [`LlmBackend`] and send one request to one provider.
//! [`ProviderRegistry`] tracks which providers are currently usable, and
//! [`ResilientClient`] combines the two into a bounded fallback rotation.

mod http_client;
mod openrouter_backend;
mod registry;
mod resilient;
mod types;

#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub mod testing;

pub use neuroprompt_config as config;
pub use neuroprompt_utils::error::{LlmError, ProviderAttempt, ProvidersExhausted};
pub use openrouter_backend::{
    DEFAULT_BASE_URL, DEFAULT_REFERER, DEFAULT_TITLE, HttpParams, OpenRouterBackend,
};
pub use registry::{ProviderRegistry, ProviderStatus};
pub use resilient::ResilientClient;
pub use types::{CompletionRequest, LlmBackend, LlmInvocation, LlmResult, Message, Role};

use std::sync::Arc;

use crate::config::Config;

/// Construct the backend for the configured provider.
///
/// # Errors
///
/// Returns `LlmError::Unsupported` if the provider is unknown and
/// `LlmError::Misconfiguration` if provider-specific configuration is invalid
/// (for example a missing API key).
pub fn backend_from_config(config: &Config) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let provider = config.llm.provider.as_deref().unwrap_or("openrouter");
    match provider {
        "openrouter" => Ok(Arc::new(OpenRouterBackend::new_from_config(config)?)),
        unknown => Err(LlmError::Unsupported(format!(
            "Unknown LLM provider '{unknown}'. Supported providers: openrouter."
        ))),
    }
}

/// Build the resilient client for a run: the configured backend, a fresh
/// registry over the configured provider ids, and the request timeout.
///
/// # Errors
///
/// Propagates [`backend_from_config`] errors and rejects an invalid provider
/// list.
pub fn from_config(config: &Config) -> Result<ResilientClient, LlmError> {
    let backend = backend_from_config(config)?;
    client_with_backend(config, backend)
}

/// Same as [`from_config`] with an explicit backend.
///
/// # Errors
///
/// Returns `LlmError::Misconfiguration` if the provider list is empty or has
/// duplicates.
pub fn client_with_backend(
    config: &Config,
    backend: Arc<dyn LlmBackend>,
) -> Result<ResilientClient, LlmError> {
    let registry = ProviderRegistry::from_ids(&config.provider_ids())?;
    tracing::debug!(
        providers = ?registry.ids(),
        timeout_secs = config.request_timeout().as_secs(),
        "Provider registry initialized"
    );
    Ok(ResilientClient::new(
        backend,
        Arc::new(registry),
        config.request_timeout(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;

    #[test]
    fn test_unknown_provider_is_unsupported() {
        let mut config = Config::minimal_for_testing();
        config.llm.provider = Some("gemini-cli".to_string());

        let Err(err) = backend_from_config(&config) else {
            panic!("unknown provider should be rejected");
        };
        assert!(matches!(err, LlmError::Unsupported(_)));
    }

    #[test]
    fn test_client_with_backend_uses_configured_order() {
        let mut config = Config::minimal_for_testing();
        config.llm.primary_model = Some("A".to_string());
        config.llm.fallback_models = Some(vec!["B".to_string(), "C".to_string()]);
        config.defaults.request_timeout_secs = Some(12);

        let client = client_with_backend(&config, Arc::new(ScriptedBackend::failing(&[]))).unwrap();

        assert_eq!(client.registry().ids(), vec!["A", "B", "C"]);
        assert_eq!(client.request_timeout().as_secs(), 12);
    }
}

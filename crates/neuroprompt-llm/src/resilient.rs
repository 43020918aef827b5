//! Completion client that rotates through the provider registry on failure

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use neuroprompt_utils::error::{ProviderAttempt, ProvidersExhausted};
use neuroprompt_utils::logging::log_provider_failure;

use crate::LlmError;
use crate::registry::ProviderRegistry;
use crate::types::{CompletionRequest, LlmBackend, LlmResult};

/// Resilient completion client.
///
/// Each call to [`ResilientClient::complete`] makes at most one attempt per
/// registered provider. A failed attempt marks its provider unavailable and the
/// next attempt asks the registry again, so the rotation and the self-healing
/// reset both live in [`ProviderRegistry`].
#[derive(Clone)]
pub struct ResilientClient {
    backend: Arc<dyn LlmBackend>,
    registry: Arc<ProviderRegistry>,
    request_timeout: Duration,
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("registry", &self.registry)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl ResilientClient {
    #[must_use]
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        registry: Arc<ProviderRegistry>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            registry,
            request_timeout,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Serve one logical request.
    ///
    /// Returns the first successful payload, tagged with the attempt number.
    /// If every attempt fails, the attempts are returned in order as a value;
    /// this method never panics on provider failure and never loops beyond
    /// `registry.len()` attempts.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<LlmResult, ProvidersExhausted> {
        let max_attempts = self.registry.len();
        let mut attempts = Vec::with_capacity(max_attempts);

        for attempt in 1..=max_attempts {
            let provider = self.registry.available_provider();
            debug!(
                provider = %provider,
                attempt,
                max_attempts,
                request = request.label().unwrap_or("completion"),
                "Sending completion request"
            );

            let invocation = request.to_invocation(&provider, self.request_timeout);
            let outcome =
                match tokio::time::timeout(self.request_timeout, self.backend.invoke(invocation))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(LlmError::Timeout {
                        duration: self.request_timeout,
                    }),
                };

            match outcome {
                Ok(mut result) => {
                    result.attempt = Some(attempt);
                    if attempt > 1 {
                        info!(provider = %provider, attempt, "Completion served by fallback provider");
                    }
                    return Ok(result);
                }
                Err(error) => {
                    log_provider_failure(&provider, attempt, max_attempts, &error.to_string());
                    self.registry.mark_unavailable(&provider);
                    attempts.push(ProviderAttempt { provider, error });
                }
            }
        }

        Err(ProvidersExhausted { attempts })
    }
}

//! Scripted in-process backend for tests.
//!
//! Test seam; not part of public API stability guarantees.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::LlmError;
use crate::types::{LlmBackend, LlmInvocation, LlmResult};

type Handler = dyn Fn(&LlmInvocation) -> Result<String, LlmError> + Send + Sync;

/// Backend whose answers are computed by a closure, recording every call.
pub struct ScriptedBackend {
    handler: Box<Handler>,
    fail_first: usize,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
    invocations: Mutex<Vec<LlmInvocation>>,
}

impl ScriptedBackend {
    /// Answer every invocation with `handler`
    pub fn new(
        handler: impl Fn(&LlmInvocation) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            fail_first: 0,
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Providers in `down` always fail with an outage; others answer
    /// `"response from <provider>"`.
    pub fn failing(down: &[&str]) -> Self {
        let down: Vec<String> = down.iter().map(|s| (*s).to_string()).collect();
        Self::new(move |inv| {
            if down.contains(&inv.model) {
                Err(LlmError::ProviderOutage(format!(
                    "{} returned server error: 503 Service Unavailable",
                    inv.model
                )))
            } else {
                Ok(format!("response from {}", inv.model))
            }
        })
    }

    /// The first `n` invocations fail whatever the provider; later ones succeed.
    pub fn fail_first_calls(n: usize) -> Self {
        let mut backend = Self::failing(&[]);
        backend.fail_first = n;
        backend
    }

    /// Make one provider slow to answer
    #[must_use]
    pub fn with_delay(mut self, provider: &str, delay: Duration) -> Self {
        self.delays.insert(provider.to_string(), delay);
        self
    }

    /// Provider identifiers in call order
    pub fn calls(&self) -> Vec<String> {
        self.invocations().into_iter().map(|inv| inv.model).collect()
    }

    pub fn invocations(&self) -> Vec<LlmInvocation> {
        self.invocations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.invocations
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(inv.clone());

        if let Some(delay) = self.delays.get(&inv.model) {
            tokio::time::sleep(*delay).await;
        }

        if call_index < self.fail_first {
            return Err(LlmError::Transport(format!(
                "{} request failed: connection reset",
                inv.model
            )));
        }

        let content = (self.handler)(&inv)?;
        Ok(LlmResult::new(content, "scripted", inv.model))
    }
}

//! Core types for the completion backend abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::LlmError;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// One logical completion request, independent of which provider serves it.
///
/// Immutable once constructed; the resilient client turns it into one
/// [`LlmInvocation`] per provider attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    label: Option<String>,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(messages: Vec<Message>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            messages,
            temperature,
            max_tokens,
            label: None,
        }
    }

    /// Tag the request (usually with the stage name) for logs
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    #[must_use]
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Build the invocation sent to one provider
    #[must_use]
    pub fn to_invocation(&self, provider: &str, timeout: Duration) -> LlmInvocation {
        LlmInvocation::new(
            self.label.as_deref().unwrap_or("completion"),
            provider,
            timeout,
            self.messages.clone(),
        )
        .with_metadata("temperature", serde_json::json!(self.temperature))
        .with_metadata("max_tokens", serde_json::json!(self.max_tokens))
    }
}

/// Input to a single backend invocation
#[derive(Debug, Clone)]
pub struct LlmInvocation {
    /// Stage (or other caller) the invocation belongs to
    pub stage: String,
    /// Provider identifier; for OpenRouter this is the model id
    pub model: String,
    pub timeout: Duration,
    pub messages: Vec<Message>,
    /// Request parameters such as `temperature` and `max_tokens`
    pub metadata: HashMap<String, serde_json::Value>,
}

impl LlmInvocation {
    #[must_use]
    pub fn new(
        stage: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            stage: stage.into(),
            model: model.into(),
            timeout,
            messages,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Successful completion payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResult {
    /// Completion text
    pub raw_response: String,
    /// Backend name (e.g. "openrouter")
    pub provider: String,
    /// Provider identifier that actually served the request
    pub model_used: String,
    pub tokens_input: Option<u64>,
    pub tokens_output: Option<u64>,
    /// 1-based attempt number within the resilient client
    pub attempt: Option<usize>,
}

impl LlmResult {
    #[must_use]
    pub fn new(
        raw_response: impl Into<String>,
        provider: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            raw_response: raw_response.into(),
            provider: provider.into(),
            model_used: model_used.into(),
            tokens_input: None,
            tokens_output: None,
            attempt: None,
        }
    }

    #[must_use]
    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens_input = Some(input);
        self.tokens_output = Some(output);
        self
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.raw_response
    }
}

/// Trait for completion backend implementations
///
/// One backend may serve many provider identifiers; the identifier travels in
/// [`LlmInvocation::model`].
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Send one request to one provider.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` for any failure during invocation, including
    /// transport failures, provider errors (auth, quota, outages), timeouts
    /// and unusable payloads.
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError>;
}

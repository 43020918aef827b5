//! OpenRouter HTTP backend implementation
//!
//! OpenRouter exposes many models behind one OpenAI-compatible chat-completions
//! endpoint, so a single backend instance serves every provider identifier in
//! the registry: the identifier is sent as the `model` field.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use neuroprompt_config::Config;

use crate::LlmError;
use crate::http_client::HttpClient;
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};

/// Default OpenRouter API endpoint
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default HTTP referer header value
pub const DEFAULT_REFERER: &str = "https://neuroprompt.example.com";

/// Default X-Title header value
pub const DEFAULT_TITLE: &str = "NeuroPrompt";

/// HTTP request parameters
#[derive(Debug, Clone, PartialEq)]
pub struct HttpParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

/// OpenRouter chat-completions backend
#[derive(Clone)]
pub struct OpenRouterBackend {
    client: HttpClient,
    base_url: String,
    api_key: String,
    referer: String,
    title: String,
    default_params: HttpParams,
}

impl std::fmt::Debug for OpenRouterBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("default_params", &self.default_params)
            .finish()
    }
}

impl OpenRouterBackend {
    /// Create a new OpenRouter backend
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the API key is empty or the HTTP
    /// client cannot be constructed
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        default_params: HttpParams,
    ) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::Misconfiguration(
                "OpenRouter API key is empty".to_string(),
            ));
        }

        Ok(Self {
            client: HttpClient::new()?,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
            default_params,
        })
    }

    /// Override the `HTTP-Referer` and `X-Title` attribution headers
    #[must_use]
    pub fn with_attribution(mut self, referer: impl Into<String>, title: impl Into<String>) -> Self {
        self.referer = referer.into();
        self.title = title.into();
        self
    }

    /// Create a new OpenRouter backend from configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the API key environment variable
    /// is not set or the HTTP client cannot be constructed
    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let api_key_env = config.api_key_env();

        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                LlmError::Misconfiguration(format!(
                    "OpenRouter API key not found in environment variable '{api_key_env}'. \
                     Set it (a .env file works) or configure a different api_key_env in [llm]."
                ))
            })?;

        let default_params = HttpParams {
            max_tokens: config
                .defaults
                .max_tokens
                .unwrap_or(HttpParams::default().max_tokens),
            temperature: config
                .defaults
                .temperature
                .unwrap_or(HttpParams::default().temperature),
        };

        let backend = Self::new(api_key, config.llm.base_url.clone(), default_params)?;
        Ok(backend.with_attribution(
            config.llm.referer.as_deref().unwrap_or(DEFAULT_REFERER),
            config.llm.title.as_deref().unwrap_or(DEFAULT_TITLE),
        ))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve parameters for this invocation
    ///
    /// `inv.metadata["max_tokens"]` and `inv.metadata["temperature"]` override
    /// the backend defaults.
    fn resolve_params(&self, inv: &LlmInvocation) -> HttpParams {
        let max_tokens = inv
            .metadata
            .get("max_tokens")
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(self.default_params.max_tokens);

        let temperature = inv
            .metadata
            .get("temperature")
            .and_then(serde_json::Value::as_f64)
            .map(|v| v as f32)
            .unwrap_or(self.default_params.temperature);

        HttpParams {
            max_tokens,
            temperature,
        }
    }

    /// Convert messages to OpenAI-compatible format
    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|msg| OpenAiMessage {
                role: match msg.role {
                    Role::System => "system".to_string(),
                    Role::User => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                },
                content: msg.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl LlmBackend for OpenRouterBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        if inv.model.trim().is_empty() {
            return Err(LlmError::Misconfiguration(
                "OpenRouter invocation has no model id".to_string(),
            ));
        }
        let params = self.resolve_params(&inv);

        debug!(
            provider = "openrouter",
            model = %inv.model,
            stage = %inv.stage,
            max_tokens = params.max_tokens,
            temperature = params.temperature,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking OpenRouter backend"
        );

        let request_body = OpenRouterRequest {
            model: inv.model.clone(),
            messages: Self::convert_messages(&inv.messages),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let request = self
            .client
            .inner()
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", self.referer.as_str())
            .header("X-Title", self.title.as_str())
            .header("Content-Type", "application/json")
            .json(&request_body);

        let response = self
            .client
            .execute(request, inv.timeout, &inv.model)
            .await?;

        let response_body: OpenRouterResponse = response.json().await.map_err(|e| {
            LlmError::InvalidResponse(format!("Failed to parse OpenRouter response: {e}"))
        })?;

        let choice = response_body.choices.first().ok_or_else(|| {
            LlmError::InvalidResponse("OpenRouter response missing choices[0]".to_string())
        })?;

        let content = choice
            .message
            .content
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                LlmError::InvalidResponse(
                    "OpenRouter response has no content in choices[0]".to_string(),
                )
            })?;

        let mut result = LlmResult::new(content, "openrouter", inv.model);
        if let Some(usage) = response_body.usage {
            result = result.with_tokens(usage.prompt_tokens, usage.completion_tokens);
        }

        debug!(
            provider = "openrouter",
            model = %result.model_used,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "OpenRouter invocation completed"
        );

        Ok(result)
    }
}

/// OpenAI-compatible message format for requests
#[derive(Debug, Clone, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

/// OpenRouter request body (OpenAI-compatible)
#[derive(Debug, Clone, Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenRouterResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

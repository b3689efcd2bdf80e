//! Sampling backends.
//!
//! The LLM itself is an opaque remote call with its own latency and failure
//! profile; [`SamplingBackend`] is the seam. [`AnthropicBackend`] talks to
//! the Messages API; [`EchoBackend`] is deterministic and offline.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Role, SamplingError, SamplingReply, SamplingRequest};

/// Anthropic API base URL.
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Seam to the model that actually produces completions.
#[async_trait]
pub trait SamplingBackend: Send + Sync {
    /// Produce a completion for the request.
    async fn complete(&self, request: &SamplingRequest) -> Result<SamplingReply, SamplingError>;

    /// Backend name, for logs.
    fn name(&self) -> &str;
}

/// Anthropic Messages API backend, non-streaming.
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    /// Create a new backend.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Create from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env(model: impl Into<String>) -> Option<Self> {
        std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .map(|key| Self::new(key, model))
    }
}

#[async_trait]
impl SamplingBackend for AnthropicBackend {
    async fn complete(&self, request: &SamplingRequest) -> Result<SamplingReply, SamplingError> {
        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: match m.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    content: m.content.clone(),
                })
                .collect(),
        };

        debug!(model = %self.model, messages = body.messages.len(), "Sending sampling request");

        let response = self
            .client
            .post(format!("{ANTHROPIC_API_URL}/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SamplingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        let content = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(SamplingReply {
            content,
            model: parsed.model,
            stop_reason: parsed.stop_reason,
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text { text: String },
}

/// Deterministic offline backend: echoes the last user message.
pub struct EchoBackend;

#[async_trait]
impl SamplingBackend for EchoBackend {
    async fn complete(&self, request: &SamplingRequest) -> Result<SamplingReply, SamplingError> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .ok_or_else(|| SamplingError::Backend("no user message to echo".to_string()))?;

        Ok(SamplingReply {
            content: format!("echo: {last_user}"),
            model: "echo".to_string(),
            stop_reason: Some("end_turn".to_string()),
        })
    }

    fn name(&self) -> &str {
        "echo"
    }
}

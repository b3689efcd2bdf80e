//! # courier-sampling
//!
//! LLM sampling carried over the call bridge.
//!
//! This crate provides:
//! - [`SamplingClient`] - the caller side, wrapping a bridge instance
//!   configured with the sampling topic pair
//! - [`SamplingBackend`] - the seam to the actual LLM (Anthropic or a
//!   deterministic echo for offline use)
//! - [`SamplingExecutor`] - the service consuming sampling requests and
//!   publishing responses

pub mod backend;
pub mod client;
pub mod executor;

pub use backend::{AnthropicBackend, EchoBackend, SamplingBackend};
pub use client::SamplingClient;
pub use executor::SamplingExecutor;

use courier_bridge::CallError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operation label used for all sampling traffic.
pub const SAMPLING_OPERATION: &str = "sampling";

/// Message role in a sampling conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingMessage {
    pub role: Role,
    pub content: String,
}

impl SamplingMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A sampling request, carried opaquely through the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingRequest {
    /// Conversation so far.
    pub messages: Vec<SamplingMessage>,
    /// Optional system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Token cap for the sampled message.
    pub max_tokens: u32,
}

impl SamplingRequest {
    /// Single-turn request from one user prompt.
    pub fn from_prompt(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            messages: vec![SamplingMessage::user(prompt)],
            system: None,
            max_tokens,
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// The sampled completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingReply {
    /// Generated text.
    pub content: String,
    /// Model that produced it.
    pub model: String,
    /// Why generation stopped, when the backend reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

/// Errors from sampling operations.
#[derive(Debug, Error)]
pub enum SamplingError {
    /// The bridged call failed (transport, timeout, or remote error).
    #[error(transparent)]
    Call(#[from] CallError),

    /// The backend rejected or failed the request.
    #[error("backend error: {0}")]
    Backend(String),

    /// HTTP-level failure reaching the backend.
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend API returned an error status.
    #[error("backend API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Payload encoding/decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SamplingError> for courier_core::Error {
    fn from(e: SamplingError) -> Self {
        courier_core::Error::Sampling(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = SamplingRequest::from_prompt("Write an overview.", 256)
            .with_system("You write READMEs.");
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"maxTokens\":256"));
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"system\":\"You write READMEs.\""));
    }

    #[test]
    fn test_reply_omits_absent_stop_reason() {
        let reply = SamplingReply {
            content: "hello".to_string(),
            model: "echo".to_string(),
            stop_reason: None,
        };
        let json = serde_json::to_string(&reply).unwrap();
        assert!(!json.contains("stopReason"));
    }
}

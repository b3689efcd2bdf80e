//! Configuration system for Courier.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;

/// Main configuration struct for Courier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service tag stamped into outgoing envelopes
    pub source: String,
    /// Message channel settings
    pub channel: ChannelConfig,
    /// Tool-call topic pair
    pub tools: TopicPair,
    /// Sampling topic pair
    pub sampling: TopicPair,
    /// Call timeouts
    pub timeouts: TimeoutConfig,
    /// HTTP gateway settings
    pub gateway: GatewayConfig,
    /// Sampling backend selection
    pub backend: BackendConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: "courier".to_string(),
            channel: ChannelConfig::default(),
            tools: TopicPair {
                request_topic: "mcp.tool.requests".to_string(),
                response_topic: "mcp.tool.responses".to_string(),
                group: "tool-server".to_string(),
            },
            sampling: TopicPair {
                request_topic: "mcp.sampling.requests".to_string(),
                response_topic: "mcp.sampling.responses".to_string(),
                group: "sampling-server".to_string(),
            },
            timeouts: TimeoutConfig::default(),
            gateway: GatewayConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Per-subscription queue capacity before publishers see backpressure
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// An outbound/inbound topic pair for one bridge instance.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TopicPair {
    /// Topic requests are published to
    pub request_topic: String,
    /// Topic responses arrive on
    pub response_topic: String,
    /// Consumer group for the executor side
    pub group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default timeout for tool calls, in milliseconds
    pub tool_call_ms: u64,
    /// Default timeout for sampling calls, in milliseconds
    pub sampling_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            tool_call_ms: 30_000,
            sampling_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address for the HTTP gateway
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8800".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend kind: "anthropic" or "echo"
    pub kind: String,
    /// Model passed to the backend
    pub model: String,
    /// Maximum tokens per sampled message
    pub max_tokens: u32,
    /// API key; falls back to ANTHROPIC_API_KEY when unset
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: "echo".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            api_key: None,
        }
    }
}

impl BackendConfig {
    /// Resolve the API key from config or environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        std::env::var("ANTHROPIC_API_KEY").ok()
    }
}

/// Validation result with multiple issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation issues
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a new empty validation result.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Check if validation passed (no errors).
    pub fn is_ok(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == IssueSeverity::Error)
    }

    /// Get only error-level issues.
    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .collect()
    }

    /// Get only warning-level issues.
    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .collect()
    }

    /// Add an error.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Error,
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning.
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Warning,
            field: field.into(),
            message: message.into(),
        });
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue
    pub severity: IssueSeverity,
    /// Field path (e.g., "tools.request_topic")
    pub field: String,
    /// Human-readable message
    pub message: String,
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Warnings don't prevent loading
    Warning,
    /// Errors prevent loading
    Error,
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, figment::Error> {
        let config_dir = Self::config_dir();

        Figment::new()
            // Default values
            .merge(figment::providers::Serialized::defaults(Config::default()))
            // User config
            .merge(Toml::file(config_dir.join("config.toml")))
            // Project config
            .merge(Toml::file(".courier/config.toml"))
            // Environment variables
            .merge(Env::prefixed("COURIER_").split("_"))
            .extract()
    }

    /// Load and validate configuration.
    pub fn load_validated() -> Result<Self, Error> {
        let config = Self::load().map_err(|e| Error::Config(e.to_string()))?;
        let result = config.validate();

        if !result.is_ok() {
            let errors: Vec<String> = result
                .errors()
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            return Err(Error::Config(format!(
                "Configuration validation failed:\n  {}",
                errors.join("\n  ")
            )));
        }

        for warning in result.warnings() {
            tracing::warn!("Config warning - {}: {}", warning.field, warning.message);
        }

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.source.is_empty() {
            result.add_error("source", "Service tag cannot be empty");
        }

        if self.channel.capacity == 0 {
            result.add_error("channel.capacity", "capacity must be greater than 0");
        }

        Self::validate_pair(&mut result, "tools", &self.tools);
        Self::validate_pair(&mut result, "sampling", &self.sampling);

        // A bridge subscribing to its own request topic would consume the
        // executor's traffic; the two pairs must also not overlap each other.
        if !self.tools.request_topic.is_empty()
            && (self.tools.request_topic == self.sampling.request_topic
                || self.tools.response_topic == self.sampling.response_topic)
        {
            result.add_error(
                "sampling",
                "tool and sampling topic pairs must be disjoint",
            );
        }

        if self.timeouts.tool_call_ms == 0 {
            result.add_error("timeouts.tool_call_ms", "timeout must be greater than 0");
        }
        if self.timeouts.sampling_ms == 0 {
            result.add_error("timeouts.sampling_ms", "timeout must be greater than 0");
        }

        if self.gateway.bind.parse::<std::net::SocketAddr>().is_err() {
            result.add_error(
                "gateway.bind",
                format!("'{}' is not a valid socket address", self.gateway.bind),
            );
        }

        let valid_backends = ["anthropic", "echo"];
        if !valid_backends.contains(&self.backend.kind.as_str()) {
            result.add_error(
                "backend.kind",
                format!(
                    "Invalid backend '{}'. Valid values: {:?}",
                    self.backend.kind, valid_backends
                ),
            );
        }

        if self.backend.kind == "anthropic" && self.backend.resolve_api_key().is_none() {
            result.add_warning(
                "backend.api_key",
                "anthropic backend selected but no API key configured",
            );
        }

        if self.backend.max_tokens == 0 {
            result.add_error("backend.max_tokens", "max_tokens must be greater than 0");
        }

        result
    }

    fn validate_pair(result: &mut ValidationResult, prefix: &str, pair: &TopicPair) {
        if pair.request_topic.is_empty() {
            result.add_error(
                format!("{prefix}.request_topic"),
                "Topic name cannot be empty",
            );
        }
        if pair.response_topic.is_empty() {
            result.add_error(
                format!("{prefix}.response_topic"),
                "Topic name cannot be empty",
            );
        }
        if !pair.request_topic.is_empty() && pair.request_topic == pair.response_topic {
            result.add_error(
                format!("{prefix}.response_topic"),
                "Request and response topics must be distinct",
            );
        }
        if pair.group.is_empty() {
            result.add_error(format!("{prefix}.group"), "Consumer group cannot be empty");
        }
    }

    /// Get the configuration directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("courier"))
            .unwrap_or_else(|| PathBuf::from("~/.config/courier"))
    }
}

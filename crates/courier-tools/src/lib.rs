//! # courier-tools
//!
//! Tool implementations for Courier.
//!
//! This crate provides:
//! - The [`Tool`] trait and [`ToolRegistry`]
//! - README validation and generation tools
//! - [`ToolExecutor`] - the service consuming tool requests from the channel
//!
//! Tools here are pure string processing; the generation tool optionally
//! reaches back through the sampling bridge for LLM-drafted prose.

use thiserror::Error;

pub mod executor;
pub mod readme;
pub mod registry;
pub mod tool;

pub use executor::ToolExecutor;
pub use readme::{GenerateReadmeTool, ValidateReadmeTool};
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolDefinition};

/// Errors that can occur during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool was not found in the registry.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Invalid arguments provided to the tool.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Required parameter is missing.
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// Parameter has wrong type.
    #[error("parameter '{0}' has wrong type: expected {1}")]
    WrongType(String, String),

    /// Regex pattern error.
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic execution error.
    #[error("execution error: {0}")]
    Execution(String),
}

impl ToolError {
    /// Create an invalid arguments error.
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a missing parameter error.
    pub fn missing_param(name: impl Into<String>) -> Self {
        Self::MissingParameter(name.into())
    }

    /// Create a wrong type error.
    pub fn wrong_type(param: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::WrongType(param.into(), expected.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}

impl From<ToolError> for courier_core::Error {
    fn from(e: ToolError) -> Self {
        courier_core::Error::Tool(e.to_string())
    }
}

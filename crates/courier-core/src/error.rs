//! Error types for Courier.
//!
//! Each subsystem crate defines its own structured error enum; this module
//! provides the coarse top-level type those errors converge into at the
//! service boundary.

use thiserror::Error;

/// Result type alias using the Courier error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Courier.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Message channel error
    #[error("Channel error: {0}")]
    Channel(String),

    /// Bridged call error
    #[error("Call error: {0}")]
    Call(String),

    /// Tool execution error
    #[error("Tool error: {0}")]
    Tool(String),

    /// Sampling error
    #[error("Sampling error: {0}")]
    Sampling(String),

    /// Envelope validation error
    #[error("Envelope error: {0}")]
    Envelope(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = Error::Channel("bus closed".to_string());
        assert_eq!(err.to_string(), "Channel error: bus closed");
    }

    #[test]
    fn test_json_error_converts() {
        let bad = serde_json::from_str::<serde_json::Value>("{");
        let err: Error = bad.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }
}

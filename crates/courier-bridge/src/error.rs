//! Bridge-specific error types.

use courier_core::CorrelationId;
use courier_bus::ChannelError;
use thiserror::Error;

/// Errors surfaced to callers of [`CallBridge::call`](crate::CallBridge::call).
///
/// The three wire-facing kinds (transport, timeout, remote) are deliberately
/// distinguishable: a caller that treats a remote-reported failure and a
/// missing response the same way cannot implement a sane retry policy.
#[derive(Debug, Error)]
pub enum CallError {
    /// Precondition violation; nothing was published.
    #[error("invalid call: {0}")]
    InvalidCall(String),

    /// Publishing the request envelope failed; no waiter is left registered.
    #[error("failed to publish request for '{operation}': {source}")]
    Transport {
        operation: String,
        #[source]
        source: ChannelError,
    },

    /// No response arrived within the configured window.
    #[error("'{operation}' timed out after {timeout_ms}ms (correlation id {correlation_id})")]
    Timeout {
        operation: String,
        correlation_id: CorrelationId,
        timeout_ms: u64,
    },

    /// The remote executor reported an error in the response envelope.
    #[error("'{operation}' failed remotely: {message}")]
    Remote { operation: String, message: String },

    /// The bridge was shut down while the call was in flight.
    #[error("bridge shut down while '{operation}' was in flight")]
    ShuttingDown { operation: String },

    /// Request payload could not be encoded.
    #[error("failed to encode request: {0}")]
    Codec(#[from] serde_json::Error),
}

impl CallError {
    /// Create a precondition-violation error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidCall(msg.into())
    }
}

impl From<CallError> for courier_core::Error {
    fn from(e: CallError) -> Self {
        courier_core::Error::Call(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display_carries_context() {
        let id = CorrelationId::new();
        let err = CallError::Timeout {
            operation: "validate-readme".to_string(),
            correlation_id: id,
            timeout_ms: 5000,
        };
        let text = err.to_string();
        assert!(text.contains("validate-readme"));
        assert!(text.contains("5000ms"));
        assert!(text.contains(&id.to_string()));
    }

    #[test]
    fn test_remote_display() {
        let err = CallError::Remote {
            operation: "sampling".to_string(),
            message: "invalid arguments".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "'sampling' failed remotely: invalid arguments"
        );
    }

    #[test]
    fn test_into_core_error() {
        let err = CallError::invalid("empty operation name");
        let core: courier_core::Error = err.into();
        assert!(matches!(core, courier_core::Error::Call(_)));
    }
}

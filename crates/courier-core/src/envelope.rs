//! Event envelope and wire types.
//!
//! Every message on the channel is a generic event envelope (CloudEvents
//! convention: specversion, type, source, id, data) whose `data` field carries
//! either a [`CallRequest`] or a [`CallResponse`]. The `type` field
//! discriminates tool traffic from sampling traffic and requests from
//! responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Envelope spec version carried in every event.
pub const SPEC_VERSION: &str = "1.0";

/// Event type for tool invocation requests.
pub const TOOL_REQUEST: &str = "io.courier.tool.request";
/// Event type for tool invocation responses.
pub const TOOL_RESPONSE: &str = "io.courier.tool.response";
/// Event type for sampling requests.
pub const SAMPLING_REQUEST: &str = "io.courier.sampling.request";
/// Event type for sampling responses.
pub const SAMPLING_RESPONSE: &str = "io.courier.sampling.response";

/// Correlation id linking a request to its eventual response across
/// independent publish operations.
///
/// A 128-bit random token; collision-free for the lifetime of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh correlation id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Generic event envelope wrapping all channel traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Envelope spec version (always "1.0").
    pub specversion: String,
    /// Event type, discriminating message kinds.
    #[serde(rename = "type")]
    pub kind: String,
    /// Service that produced the event.
    pub source: String,
    /// Unique event id (distinct from the correlation id in `data`).
    pub id: String,
    /// Creation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    /// Payload: a [`CallRequest`] or [`CallResponse`] as JSON.
    pub data: Value,
}

impl EventEnvelope {
    /// Create a new envelope of the given kind.
    pub fn new(kind: impl Into<String>, source: impl Into<String>, data: Value) -> Self {
        Self {
            specversion: SPEC_VERSION.to_string(),
            kind: kind.into(),
            source: source.into(),
            id: Uuid::new_v4().to_string(),
            time: Some(Utc::now()),
            data,
        }
    }

    /// Validate the envelope shape.
    ///
    /// Checks the fields the router relies on; payload validation is the
    /// responsibility of whoever deserializes `data`.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.specversion != SPEC_VERSION {
            return Err(crate::Error::Envelope(format!(
                "unsupported specversion '{}'",
                self.specversion
            )));
        }
        if self.kind.is_empty() {
            return Err(crate::Error::Envelope("empty event type".to_string()));
        }
        if self.source.is_empty() {
            return Err(crate::Error::Envelope("empty event source".to_string()));
        }
        if self.id.is_empty() {
            return Err(crate::Error::Envelope("empty event id".to_string()));
        }
        Ok(())
    }

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Request payload published to an outbound request topic.
///
/// Immutable once constructed; the correlation id is the sole join key
/// between this message and its eventual response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    /// Correlation id echoed by the responder.
    pub correlation_id: CorrelationId,
    /// Tool name, or "sampling" for sampling traffic.
    pub operation: String,
    /// Opaque argument payload.
    pub arguments: Value,
    /// Caller service tag.
    pub source: String,
}

impl CallRequest {
    /// Create a new request payload.
    pub fn new(
        correlation_id: CorrelationId,
        operation: impl Into<String>,
        arguments: Value,
        source: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id,
            operation: operation.into(),
            arguments,
            source: source.into(),
        }
    }
}

/// Response payload published back on a response topic.
///
/// Exactly one of `result`/`error` is present; there is no third state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResponse {
    /// Correlation id of the request this answers.
    pub correlation_id: CorrelationId,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallResponse {
    /// Create a success response.
    pub fn success(correlation_id: CorrelationId, result: Value) -> Self {
        Self {
            correlation_id,
            result: Some(result),
            error: None,
        }
    }

    /// Create a failure response.
    pub fn failure(correlation_id: CorrelationId, error: impl Into<String>) -> Self {
        Self {
            correlation_id,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Check the exactly-one-of-result-or-error invariant.
    pub fn validate(&self) -> Result<(), crate::Error> {
        match (&self.result, &self.error) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err(crate::Error::Envelope(
                "response carries both result and error".to_string(),
            )),
            (None, None) => Err(crate::Error::Envelope(
                "response carries neither result nor error".to_string(),
            )),
        }
    }

    /// Collapse into the outcome the waiter is resolved with.
    pub fn into_outcome(self) -> std::result::Result<Value, String> {
        match (self.result, self.error) {
            (Some(value), _) => Ok(value),
            (None, Some(message)) => Err(message),
            (None, None) => Err("response carried neither result nor error".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_field_names() {
        let id = CorrelationId::new();
        let request = CallRequest::new(id, "validate-readme", json!({"content": "# X"}), "agent");

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"correlationId\""));
        assert!(json.contains("\"operation\":\"validate-readme\""));
        assert!(json.contains("\"arguments\""));
        assert!(json.contains("\"source\":\"agent\""));
    }

    #[test]
    fn test_response_omits_absent_branch() {
        let id = CorrelationId::new();
        let ok = CallResponse::success(id, json!({"valid": true}));
        let json = serde_json::to_string(&ok).unwrap();
        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"error\""));

        let err = CallResponse::failure(id, "invalid arguments");
        let json = serde_json::to_string(&err).unwrap();
        assert!(!json.contains("\"result\""));
        assert!(json.contains("\"error\":\"invalid arguments\""));
    }

    #[test]
    fn test_response_validate() {
        let id = CorrelationId::new();
        assert!(CallResponse::success(id, json!(1)).validate().is_ok());
        assert!(CallResponse::failure(id, "boom").validate().is_ok());

        let both = CallResponse {
            correlation_id: id,
            result: Some(json!(1)),
            error: Some("boom".to_string()),
        };
        assert!(both.validate().is_err());

        let neither = CallResponse {
            correlation_id: id,
            result: None,
            error: None,
        };
        assert!(neither.validate().is_err());
    }

    #[test]
    fn test_response_into_outcome() {
        let id = CorrelationId::new();
        assert_eq!(
            CallResponse::success(id, json!(42)).into_outcome(),
            Ok(json!(42))
        );
        assert_eq!(
            CallResponse::failure(id, "nope").into_outcome(),
            Err("nope".to_string())
        );
    }

    #[test]
    fn test_envelope_roundtrip() {
        let id = CorrelationId::new();
        let request = CallRequest::new(id, "validate-readme", json!({}), "agent");
        let envelope = EventEnvelope::new(
            TOOL_REQUEST,
            "courier-agent",
            serde_json::to_value(&request).unwrap(),
        );

        assert!(envelope.validate().is_ok());

        let bytes = envelope.to_bytes().unwrap();
        let decoded = EventEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.kind, TOOL_REQUEST);
        assert_eq!(decoded.specversion, SPEC_VERSION);

        let parsed: CallRequest = serde_json::from_value(decoded.data).unwrap();
        assert_eq!(parsed.correlation_id, id);
    }

    #[test]
    fn test_envelope_validate_rejects_bad_shapes() {
        let mut envelope = EventEnvelope::new(TOOL_RESPONSE, "tool-server", json!({}));
        envelope.specversion = "0.3".to_string();
        assert!(envelope.validate().is_err());

        let mut envelope = EventEnvelope::new(TOOL_RESPONSE, "tool-server", json!({}));
        envelope.kind = String::new();
        assert!(envelope.validate().is_err());

        let mut envelope = EventEnvelope::new(TOOL_RESPONSE, "tool-server", json!({}));
        envelope.id = String::new();
        assert!(envelope.validate().is_err());
    }

    #[test]
    fn test_correlation_id_parse_roundtrip() {
        let id = CorrelationId::new();
        let parsed = CorrelationId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(CorrelationId::parse("not-a-uuid").is_err());
    }
}

//! Gateway HTTP service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use courier_bridge::{CallBridge, CallError};
use courier_core::{CallResponse, EventEnvelope};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Errors from running the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Could not bind the listen address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The server loop failed.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared state behind the routes.
#[derive(Clone)]
pub struct GatewayState {
    /// Bridge for agent-side tool calls.
    pub tool_bridge: Arc<CallBridge>,
    /// Bridge for sampling calls (ingress delivery only).
    pub sampling_bridge: Arc<CallBridge>,
    /// Timeout applied when a request does not carry one.
    pub default_timeout: Duration,
}

/// Build the gateway router.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools/call", post(call_tool))
        .route("/events", post(ingest_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the listener fails.
pub async fn serve(addr: SocketAddr, state: GatewayState) -> Result<(), GatewayError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| GatewayError::Bind { addr, source })?;

    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "courier-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallToolBody {
    name: String,
    #[serde(default)]
    arguments: Value,
    timeout_ms: Option<u64>,
}

/// Synchronous tool invocation over the bridge.
async fn call_tool(State(state): State<GatewayState>, Json(body): Json<CallToolBody>) -> Response {
    let timeout = body
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(state.default_timeout);

    match state
        .tool_bridge
        .call(&body.name, body.arguments, timeout)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(json!({ "result": result }))).into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(error: CallError) -> Response {
    let (status, kind) = match &error {
        CallError::InvalidCall(_) | CallError::Codec(_) => (StatusCode::BAD_REQUEST, "invalid"),
        CallError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
        CallError::Remote { .. } => (StatusCode::BAD_GATEWAY, "remote"),
        CallError::Transport { .. } | CallError::ShuttingDown { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "transport")
        }
    };
    (
        status,
        Json(json!({ "error": error.to_string(), "kind": kind })),
    )
        .into_response()
}

/// CloudEvents ingress.
///
/// The body is parsed by hand rather than through the JSON extractor: a
/// malformed envelope must still be answered 200, because the 200 is the
/// broker-facing ack and acking is orthogonal to whether anything matched.
async fn ingest_event(State(state): State<GatewayState>, body: Bytes) -> impl IntoResponse {
    handle_event(&state, &body);
    Json(json!({ "status": "ok" }))
}

fn handle_event(state: &GatewayState, body: &[u8]) {
    let envelope = match EventEnvelope::from_bytes(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Dropping undecodable event");
            return;
        }
    };

    if let Err(e) = envelope.validate() {
        warn!(error = %e, "Dropping invalid envelope");
        return;
    }

    let bridge = if envelope.kind == state.tool_bridge.response_kind() {
        &state.tool_bridge
    } else if envelope.kind == state.sampling_bridge.response_kind() {
        &state.sampling_bridge
    } else {
        warn!(kind = %envelope.kind, "Dropping event of unexpected kind");
        return;
    };

    let response: CallResponse = match serde_json::from_value(envelope.data) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Dropping malformed response payload");
            return;
        }
    };

    if let Err(e) = response.validate() {
        warn!(error = %e, "Dropping response violating result/error exclusivity");
        return;
    }

    bridge.deliver(response);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use courier_bridge::BridgeConfig;
    use courier_bus::{InMemoryBus, MessageChannel};
    use courier_core::config::TopicPair;
    use courier_core::envelope::TOOL_RESPONSE;
    use courier_core::CallRequest;
    use tower::ServiceExt;

    fn pair(prefix: &str) -> TopicPair {
        TopicPair {
            request_topic: format!("{prefix}.requests"),
            response_topic: format!("{prefix}.responses"),
            group: "g".to_string(),
        }
    }

    async fn test_state(bus: &Arc<InMemoryBus>) -> GatewayState {
        let channel = bus.clone() as Arc<dyn MessageChannel>;
        GatewayState {
            tool_bridge: Arc::new(CallBridge::new(
                channel.clone(),
                BridgeConfig::tool_calls(&pair("t"), "gateway"),
            )),
            sampling_bridge: Arc::new(CallBridge::new(
                channel,
                BridgeConfig::sampling(&pair("s"), "gateway"),
            )),
            default_timeout: Duration::from_secs(5),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let bus = Arc::new(InMemoryBus::new());
        let app = router(test_state(&bus).await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], json!("healthy"));
    }

    #[tokio::test]
    async fn test_call_tool_times_out_as_504() {
        let bus = Arc::new(InMemoryBus::new());
        let app = router(test_state(&bus).await);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/tools/call")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"name": "validate-readme", "arguments": {}, "timeoutMs": 50})
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["kind"], json!("timeout"));
    }

    #[tokio::test]
    async fn test_events_ingress_resolves_pending_call() {
        let bus = Arc::new(InMemoryBus::new());
        let state = test_state(&bus).await;
        let app = router(state.clone());

        let mut req_sub = bus.subscribe("t.requests", "executor").await.unwrap();

        let bridge = state.tool_bridge.clone();
        let call = tokio::spawn(async move {
            bridge
                .call("validate-readme", json!({}), Duration::from_secs(5))
                .await
        });

        let delivery = req_sub.recv().await.unwrap();
        let envelope = EventEnvelope::from_bytes(&delivery.payload).unwrap();
        delivery.ack();
        let request: CallRequest = serde_json::from_value(envelope.data).unwrap();

        // The broker POSTs the response envelope to the ingress.
        let response_envelope = EventEnvelope::new(
            TOOL_RESPONSE,
            "tool-server",
            serde_json::to_value(CallResponse::success(
                request.correlation_id,
                json!({"valid": true}),
            ))
            .unwrap(),
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/events")
                    .header("content-type", "application/json")
                    .body(Body::from(response_envelope.to_bytes().unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let result = call.await.unwrap().unwrap();
        assert_eq!(result, json!({"valid": true}));
    }

    #[tokio::test]
    async fn test_events_ingress_acks_garbage() {
        let bus = Arc::new(InMemoryBus::new());
        let app = router(test_state(&bus).await);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/events")
                    .body(Body::from("definitely not an envelope"))
                    .unwrap(),
            )
            .await
            .unwrap();

        // Still the ack: dropping is a local diagnostic, not a broker error.
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], json!("ok"));
    }
}

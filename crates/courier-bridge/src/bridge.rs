//! The call bridge.
//!
//! `call()` publishes a request envelope and suspends the caller until the
//! matching response is delivered or a timer elapses, whichever acts on the
//! registry first. `deliver()` is the inbound half: a synchronous
//! lookup-and-resolve that never suspends.

use std::sync::Arc;
use std::time::Duration;

use courier_bus::MessageChannel;
use courier_core::config::TopicPair;
use courier_core::envelope::{self, EventEnvelope};
use courier_core::{CallRequest, CallResponse};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::CallError;
use crate::pending::{PendingCallStore, PendingStats, Resolution};

/// Topic pair and envelope kinds for one bridge instance.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Topic requests are published to.
    pub request_topic: String,
    /// Topic responses arrive on.
    pub response_topic: String,
    /// Event type stamped on outgoing requests.
    pub request_kind: String,
    /// Event type expected on incoming responses.
    pub response_kind: String,
    /// Service tag stamped into request envelopes.
    pub source: String,
}

impl BridgeConfig {
    /// Configuration for the agent→tool bridge instance.
    pub fn tool_calls(topics: &TopicPair, source: impl Into<String>) -> Self {
        Self {
            request_topic: topics.request_topic.clone(),
            response_topic: topics.response_topic.clone(),
            request_kind: envelope::TOOL_REQUEST.to_string(),
            response_kind: envelope::TOOL_RESPONSE.to_string(),
            source: source.into(),
        }
    }

    /// Configuration for the tool→LLM sampling bridge instance.
    pub fn sampling(topics: &TopicPair, source: impl Into<String>) -> Self {
        Self {
            request_topic: topics.request_topic.clone(),
            response_topic: topics.response_topic.clone(),
            request_kind: envelope::SAMPLING_REQUEST.to_string(),
            response_kind: envelope::SAMPLING_RESPONSE.to_string(),
            source: source.into(),
        }
    }
}

/// Bridges fire-and-forget pub/sub onto an awaitable call/response contract.
///
/// One instance per topic pair; owned by the service that issues calls and
/// torn down with it. `call()` may be invoked concurrently from many tasks;
/// `deliver()` races freely against any in-flight call's timeout.
pub struct CallBridge {
    channel: Arc<dyn MessageChannel>,
    pending: PendingCallStore,
    config: BridgeConfig,
}

impl CallBridge {
    /// Create a bridge over a channel.
    pub fn new(channel: Arc<dyn MessageChannel>, config: BridgeConfig) -> Self {
        Self {
            channel,
            pending: PendingCallStore::new(),
            config,
        }
    }

    /// Issue a call and await its response.
    ///
    /// Publishes exactly one request envelope and then races the delivered
    /// response against `timeout`. Whichever acts on the registry first
    /// wins; the loser observes an absent entry and does nothing further.
    #[instrument(skip(self, arguments), fields(topic = %self.config.request_topic))]
    pub async fn call(
        &self,
        operation: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Value, CallError> {
        if operation.is_empty() {
            return Err(CallError::invalid("operation name is empty"));
        }
        if timeout.is_zero() {
            return Err(CallError::invalid("timeout must be greater than zero"));
        }

        // Register before publishing so a response that beats the publish
        // return still finds its waiter.
        let (correlation_id, rx) = self.pending.insert(operation);

        let request = CallRequest::new(
            correlation_id,
            operation,
            arguments,
            self.config.source.clone(),
        );
        let payload = EventEnvelope::new(
            self.config.request_kind.clone(),
            self.config.source.clone(),
            serde_json::to_value(&request)?,
        )
        .to_bytes()?;

        if let Err(source) = self.channel.publish(&self.config.request_topic, payload).await {
            // The request never went out; drop the record or it leaks forever.
            self.pending.discard(correlation_id);
            return Err(CallError::Transport {
                operation: operation.to_string(),
                source,
            });
        }

        debug!(
            correlation_id = %correlation_id,
            operation = operation,
            timeout_ms = timeout.as_millis() as u64,
            "Request published, awaiting response"
        );

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Resolution::Success(value))) => Ok(value),
            Ok(Ok(Resolution::Failure(message))) => Err(CallError::Remote {
                operation: operation.to_string(),
                message,
            }),
            Ok(Ok(Resolution::Shutdown)) | Ok(Err(_)) => Err(CallError::ShuttingDown {
                operation: operation.to_string(),
            }),
            Err(_elapsed) => {
                // May be a no-op if a response landed between the timer
                // firing and this cleanup; either way the caller gets the
                // timeout it observed.
                self.pending.discard(correlation_id);
                Err(CallError::Timeout {
                    operation: operation.to_string(),
                    correlation_id,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Deliver a response to its waiting caller.
    ///
    /// Synchronous: a registry lookup-and-resolve with no suspension point.
    /// A response that matches no pending call (late, duplicate, or issued
    /// by a peer instance) is logged and dropped.
    pub fn deliver(&self, response: CallResponse) {
        let correlation_id = response.correlation_id;
        self.pending.complete(correlation_id, response.into_outcome());
    }

    /// Reject every in-flight call with a shutdown error.
    pub fn shutdown(&self) {
        self.pending.reject_all_shutdown();
    }

    /// Number of calls currently awaiting responses.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Registry diagnostic counters.
    pub fn stats(&self) -> &PendingStats {
        self.pending.stats()
    }

    /// Event type expected on the response topic.
    pub fn response_kind(&self) -> &str {
        &self.config.response_kind
    }

    /// Topic this bridge subscribes its router to.
    pub fn response_topic(&self) -> &str {
        &self.config.response_topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_bus::{InMemoryBus, Subscription};
    use courier_core::CorrelationId;
    use serde_json::json;

    fn test_config() -> BridgeConfig {
        BridgeConfig::tool_calls(
            &TopicPair {
                request_topic: "test.requests".to_string(),
                response_topic: "test.responses".to_string(),
                group: "test-group".to_string(),
            },
            "test-agent",
        )
    }

    async fn bridge_with_bus() -> (Arc<CallBridge>, Arc<InMemoryBus>, Subscription) {
        let bus = Arc::new(InMemoryBus::new());
        let sub = bus.subscribe("test.requests", "executor").await.unwrap();
        let bridge = Arc::new(CallBridge::new(
            bus.clone() as Arc<dyn MessageChannel>,
            test_config(),
        ));
        (bridge, bus, sub)
    }

    /// Parse the published request envelope out of a delivery.
    fn parse_request(payload: &[u8]) -> CallRequest {
        let envelope = EventEnvelope::from_bytes(payload).unwrap();
        assert_eq!(envelope.kind, envelope::TOOL_REQUEST);
        serde_json::from_value(envelope.data).unwrap()
    }

    #[tokio::test]
    async fn test_empty_operation_rejected() {
        let (bridge, _bus, _sub) = bridge_with_bus().await;
        let result = bridge.call("", json!({}), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(CallError::InvalidCall(_))));
        assert_eq!(bridge.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_zero_timeout_rejected() {
        let (bridge, _bus, _sub) = bridge_with_bus().await;
        let result = bridge.call("x", json!({}), Duration::ZERO).await;
        assert!(matches!(result, Err(CallError::InvalidCall(_))));
    }

    #[tokio::test]
    async fn test_call_resolves_with_delivered_result() {
        let (bridge, _bus, mut sub) = bridge_with_bus().await;

        let responder = bridge.clone();
        tokio::spawn(async move {
            let delivery = sub.recv().await.unwrap();
            let request = parse_request(&delivery.payload);
            delivery.ack();
            responder.deliver(CallResponse::success(
                request.correlation_id,
                json!({"valid": true, "score": 85}),
            ));
        });

        let result = bridge
            .call("validate-readme", json!({"content": "# X"}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result, json!({"valid": true, "score": 85}));
        assert_eq!(bridge.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_remote_error_surfaces() {
        let (bridge, _bus, mut sub) = bridge_with_bus().await;

        let responder = bridge.clone();
        tokio::spawn(async move {
            let delivery = sub.recv().await.unwrap();
            let request = parse_request(&delivery.payload);
            delivery.ack();
            responder.deliver(CallResponse::failure(
                request.correlation_id,
                "invalid arguments",
            ));
        });

        let result = bridge
            .call("validate-readme", json!(null), Duration::from_secs(5))
            .await;
        match result {
            Err(CallError::Remote { operation, message }) => {
                assert_eq!(operation, "validate-readme");
                assert_eq!(message, "invalid arguments");
            }
            other => panic!("expected remote error, got {other:?}"),
        }
        assert_eq!(bridge.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_when_no_response() {
        let (bridge, _bus, _sub) = bridge_with_bus().await;

        let started = tokio::time::Instant::now();
        let result = bridge
            .call("validate-readme", json!({}), Duration::from_millis(5000))
            .await;

        match result {
            Err(CallError::Timeout {
                operation,
                timeout_ms,
                ..
            }) => {
                assert_eq!(operation, "validate-readme");
                assert_eq!(timeout_ms, 5000);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        // Never fires early.
        assert!(started.elapsed() >= Duration::from_millis(5000));
        assert_eq!(bridge.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_no_waiter() {
        let bus = Arc::new(InMemoryBus::new());
        bus.close();
        let bridge = CallBridge::new(bus as Arc<dyn MessageChannel>, test_config());

        let result = bridge.call("x", json!({}), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(CallError::Transport { .. })));
        assert_eq!(bridge.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_delivery_after_timeout_is_noop() {
        let (bridge, _bus, mut sub) = bridge_with_bus().await;

        let result = bridge
            .call("validate-readme", json!({}), Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(CallError::Timeout { .. })));

        // Response shows up well after the caller gave up.
        let delivery = sub.recv().await.unwrap();
        let request = parse_request(&delivery.payload);
        delivery.ack();
        bridge.deliver(CallResponse::success(request.correlation_id, json!(1)));

        assert_eq!(bridge.pending_len(), 0);
        assert_eq!(
            bridge
                .stats()
                .unmatched
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_deliver_unknown_id_never_touches_others() {
        let (bridge, _bus, mut sub) = bridge_with_bus().await;

        let responder = bridge.clone();
        let handle = tokio::spawn(async move {
            let delivery = sub.recv().await.unwrap();
            let request = parse_request(&delivery.payload);
            delivery.ack();

            // A stray response first; the real one after.
            responder.deliver(CallResponse::success(CorrelationId::new(), json!("stray")));
            responder.deliver(CallResponse::success(request.correlation_id, json!("real")));
        });

        let result = bridge
            .call("validate-readme", json!({}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result, json!("real"));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_rejects_in_flight_calls() {
        let (bridge, _bus, _sub) = bridge_with_bus().await;

        let caller = bridge.clone();
        let handle = tokio::spawn(async move {
            caller
                .call("validate-readme", json!({}), Duration::from_secs(30))
                .await
        });

        // Let the call register before tearing down.
        tokio::time::sleep(Duration::from_millis(20)).await;
        bridge.shutdown();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(CallError::ShuttingDown { .. })));
        assert_eq!(bridge.pending_len(), 0);
    }
}

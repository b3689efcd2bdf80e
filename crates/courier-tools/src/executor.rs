//! Tool executor service.
//!
//! Consumes tool request envelopes from the channel, executes them through
//! the registry, and publishes response envelopes carrying the same
//! correlation id. A slow tool never blocks the subscription: each request
//! runs in its own task.

use std::sync::Arc;

use courier_bus::{Delivery, MessageChannel};
use courier_core::config::TopicPair;
use courier_core::envelope::{TOOL_REQUEST, TOOL_RESPONSE};
use courier_core::{CallRequest, CallResponse, EventEnvelope};
use tracing::{debug, error, info, warn};

use crate::registry::ToolRegistry;

/// Service answering tool requests from the channel.
pub struct ToolExecutor {
    channel: Arc<dyn MessageChannel>,
    registry: Arc<ToolRegistry>,
    topics: TopicPair,
    source: String,
}

impl ToolExecutor {
    /// Create an executor over a registry.
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        registry: Arc<ToolRegistry>,
        topics: TopicPair,
        source: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            registry,
            topics,
            source: source.into(),
        }
    }

    /// Consume requests until the subscription closes.
    pub async fn run(self) -> Result<(), courier_core::Error> {
        let mut subscription = self
            .channel
            .subscribe(&self.topics.request_topic, &self.topics.group)
            .await?;

        info!(
            topic = %self.topics.request_topic,
            tools = self.registry.len(),
            "Tool executor started"
        );

        let this = Arc::new(self);
        while let Some(delivery) = subscription.recv().await {
            this.clone().handle(delivery);
        }

        debug!("Tool request subscription closed");
        Ok(())
    }

    /// Decode one delivery and spawn its work.
    ///
    /// The ack happens on receipt; execution failures travel back in the
    /// response envelope, not through redelivery.
    fn handle(self: Arc<Self>, delivery: Delivery) {
        let payload = delivery.payload.clone();
        delivery.ack();

        let request = match decode_request(&payload) {
            Ok(request) => request,
            Err(reason) => {
                warn!(reason = %reason, "Dropping malformed tool request");
                return;
            }
        };

        tokio::spawn(async move {
            let response = self.execute(&request).await;
            if let Err(e) = self.publish_response(response).await {
                error!(
                    correlation_id = %request.correlation_id,
                    operation = %request.operation,
                    error = %e,
                    "Failed to publish tool response"
                );
            }
        });
    }

    async fn execute(&self, request: &CallRequest) -> CallResponse {
        debug!(
            correlation_id = %request.correlation_id,
            operation = %request.operation,
            "Executing tool request"
        );

        match self
            .registry
            .execute(&request.operation, &request.arguments)
            .await
        {
            Ok(result) => CallResponse::success(request.correlation_id, result),
            Err(e) => CallResponse::failure(request.correlation_id, e.to_string()),
        }
    }

    async fn publish_response(&self, response: CallResponse) -> Result<(), courier_core::Error> {
        let envelope = EventEnvelope::new(
            TOOL_RESPONSE,
            self.source.clone(),
            serde_json::to_value(&response)?,
        );
        self.channel
            .publish(&self.topics.response_topic, envelope.to_bytes()?)
            .await?;
        Ok(())
    }
}

fn decode_request(payload: &[u8]) -> Result<CallRequest, courier_core::Error> {
    let envelope = EventEnvelope::from_bytes(payload)?;
    envelope.validate()?;
    if envelope.kind != TOOL_REQUEST {
        return Err(courier_core::Error::Envelope(format!(
            "unexpected event kind '{}'",
            envelope.kind
        )));
    }
    Ok(serde_json::from_value(envelope.data)?)
}

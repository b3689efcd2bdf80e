//! Sampling executor service.
//!
//! Consumes sampling request envelopes, invokes the backend, and publishes
//! response envelopes carrying the same correlation id. The mirror image of
//! the tool executor, on the sampling topic pair.

use std::sync::Arc;

use courier_bus::{Delivery, MessageChannel};
use courier_core::config::TopicPair;
use courier_core::envelope::{SAMPLING_REQUEST, SAMPLING_RESPONSE};
use courier_core::{CallRequest, CallResponse, EventEnvelope};
use tracing::{debug, error, info, warn};

use crate::{SamplingBackend, SamplingRequest, SAMPLING_OPERATION};

/// Service answering sampling requests from the channel.
pub struct SamplingExecutor {
    channel: Arc<dyn MessageChannel>,
    backend: Arc<dyn SamplingBackend>,
    topics: TopicPair,
    source: String,
}

impl SamplingExecutor {
    /// Create an executor.
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        backend: Arc<dyn SamplingBackend>,
        topics: TopicPair,
        source: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            backend,
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
            backend = self.backend.name(),
            "Sampling executor started"
        );

        let this = Arc::new(self);
        while let Some(delivery) = subscription.recv().await {
            this.clone().handle(delivery);
        }

        debug!("Sampling request subscription closed");
        Ok(())
    }

    /// Decode one delivery and spawn its work.
    ///
    /// The ack happens on receipt; processing failures are reported through
    /// response envelopes, not redelivery.
    fn handle(self: Arc<Self>, delivery: Delivery) {
        let payload = delivery.payload.clone();
        delivery.ack();

        let request = match decode_request(&payload) {
            Ok(request) => request,
            Err(reason) => {
                warn!(reason = %reason, "Dropping malformed sampling request");
                return;
            }
        };

        tokio::spawn(async move {
            let response = self.execute(&request).await;
            if let Err(e) = self.publish_response(response).await {
                error!(
                    correlation_id = %request.correlation_id,
                    error = %e,
                    "Failed to publish sampling response"
                );
            }
        });
    }

    async fn execute(&self, request: &CallRequest) -> CallResponse {
        if request.operation != SAMPLING_OPERATION {
            return CallResponse::failure(
                request.correlation_id,
                format!("unsupported operation '{}'", request.operation),
            );
        }

        let sampling: SamplingRequest = match serde_json::from_value(request.arguments.clone()) {
            Ok(sampling) => sampling,
            Err(e) => {
                return CallResponse::failure(
                    request.correlation_id,
                    format!("invalid sampling arguments: {e}"),
                );
            }
        };

        debug!(
            correlation_id = %request.correlation_id,
            messages = sampling.messages.len(),
            "Executing sampling request"
        );

        match self.backend.complete(&sampling).await {
            Ok(reply) => match serde_json::to_value(&reply) {
                Ok(value) => CallResponse::success(request.correlation_id, value),
                Err(e) => CallResponse::failure(
                    request.correlation_id,
                    format!("failed to encode reply: {e}"),
                ),
            },
            Err(e) => CallResponse::failure(request.correlation_id, e.to_string()),
        }
    }

    async fn publish_response(&self, response: CallResponse) -> Result<(), courier_core::Error> {
        let envelope = EventEnvelope::new(
            SAMPLING_RESPONSE,
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
    if envelope.kind != SAMPLING_REQUEST {
        return Err(courier_core::Error::Envelope(format!(
            "unexpected event kind '{}'",
            envelope.kind
        )));
    }
    Ok(serde_json::from_value(envelope.data)?)
}

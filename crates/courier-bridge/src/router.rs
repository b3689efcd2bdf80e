//! Inbound response dispatch.
//!
//! Consumes the response-topic subscription, decodes envelopes, and feeds
//! matching responses to the bridge. Anything malformed is logged and
//! skipped; the subscription loop never dies to a bad message, and every
//! delivery is acknowledged exactly once whether or not it matched.

use std::sync::Arc;

use courier_bus::Subscription;
use courier_core::{CallResponse, EventEnvelope};
use tracing::{debug, warn};

use crate::bridge::CallBridge;

/// Dispatch loop feeding one bridge's `deliver()`.
pub struct ResponseRouter {
    bridge: Arc<CallBridge>,
}

impl ResponseRouter {
    /// Create a router for a bridge.
    pub fn new(bridge: Arc<CallBridge>) -> Self {
        Self { bridge }
    }

    /// Run until the subscription closes.
    ///
    /// Acknowledgment is a transport concern, orthogonal to correlation
    /// matching: the ack happens for every delivery, matched or not, so the
    /// channel never redelivers a response merely because no local waiter
    /// was found.
    pub async fn run(self, mut subscription: Subscription) {
        debug!(
            topic = subscription.topic(),
            "Response router started"
        );

        while let Some(delivery) = subscription.recv().await {
            self.handle(&delivery.payload);
            delivery.ack();
        }

        debug!("Response subscription closed, router stopping");
    }

    fn handle(&self, payload: &[u8]) {
        let envelope = match EventEnvelope::from_bytes(payload) {
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

        if envelope.kind != self.bridge.response_kind() {
            warn!(
                kind = %envelope.kind,
                expected = self.bridge.response_kind(),
                "Dropping event of unexpected kind"
            );
            return;
        }

        let response: CallResponse = match serde_json::from_value(envelope.data) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Dropping malformed response payload");
                return;
            }
        };

        if let Err(e) = response.validate() {
            warn!(
                correlation_id = %response.correlation_id,
                error = %e,
                "Dropping response violating result/error exclusivity"
            );
            return;
        }

        self.bridge.deliver(response);
    }
}

//! Caller side of the sampling bridge.

use std::sync::Arc;
use std::time::Duration;

use courier_bridge::CallBridge;

use crate::{SamplingError, SamplingReply, SamplingRequest, SAMPLING_OPERATION};

/// Typed sampling calls over a bridge configured with the sampling topic
/// pair.
///
/// From the caller's perspective this is a synchronous LLM call; underneath
/// it is the same publish/correlate/await mechanism as tool invocation.
#[derive(Clone)]
pub struct SamplingClient {
    bridge: Arc<CallBridge>,
    default_timeout: Duration,
}

impl SamplingClient {
    /// Create a client over a sampling-configured bridge.
    pub fn new(bridge: Arc<CallBridge>, default_timeout: Duration) -> Self {
        Self {
            bridge,
            default_timeout,
        }
    }

    /// Sample a message using the default timeout.
    pub async fn create_message(
        &self,
        request: &SamplingRequest,
    ) -> Result<SamplingReply, SamplingError> {
        self.create_message_with_timeout(request, self.default_timeout)
            .await
    }

    /// Sample a message with an explicit timeout.
    pub async fn create_message_with_timeout(
        &self,
        request: &SamplingRequest,
        timeout: Duration,
    ) -> Result<SamplingReply, SamplingError> {
        let arguments = serde_json::to_value(request)?;
        let value = self
            .bridge
            .call(SAMPLING_OPERATION, arguments, timeout)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// The underlying bridge (for shutdown and diagnostics).
    pub fn bridge(&self) -> &Arc<CallBridge> {
        &self.bridge
    }
}

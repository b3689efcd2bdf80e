//! Message channel trait and delivery types.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel was closed and accepts no further traffic.
    #[error("channel closed")]
    Closed,

    /// Publishing to a topic failed.
    #[error("publish to '{topic}' failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    /// A consumer group is already subscribed to this topic.
    #[error("group '{group}' already subscribed to '{topic}'")]
    DuplicateSubscription { topic: String, group: String },
}

impl From<ChannelError> for courier_core::Error {
    fn from(e: ChannelError) -> Self {
        courier_core::Error::Channel(e.to_string())
    }
}

/// Durable pub/sub transport seam.
///
/// Implementations provide at-least-once delivery to each subscribed consumer
/// group; delivery semantics beyond that (ordering, redelivery policy) belong
/// to the broker behind the implementation.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Publish a payload to a topic.
    ///
    /// Returns once the broker has accepted the message. A topic with no
    /// subscribers is not an error.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ChannelError>;

    /// Subscribe a consumer group to a topic.
    async fn subscribe(&self, topic: &str, group: &str) -> Result<Subscription, ChannelError>;
}

/// One message handed to a subscriber, with its acknowledgment handle.
pub struct Delivery {
    /// Topic this message arrived on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// Acknowledgment handle; consumed by [`Delivery::ack`].
    acker: AckHandle,
}

impl Delivery {
    pub(crate) fn new(topic: String, payload: Vec<u8>, acker: AckHandle) -> Self {
        Self {
            topic,
            payload,
            acker,
        }
    }

    /// Acknowledge the message as processed.
    ///
    /// Consumes the delivery, so a message cannot be acked twice.
    pub fn ack(self) {
        self.acker.ack();
    }
}

/// Acknowledgment handle backed by the channel's ack counter.
pub struct AckHandle {
    acked: Arc<AtomicU64>,
}

impl AckHandle {
    pub(crate) fn new(acked: Arc<AtomicU64>) -> Self {
        Self { acked }
    }

    fn ack(self) {
        self.acked.fetch_add(1, Ordering::Relaxed);
    }
}

/// A consumer-group subscription to one topic.
pub struct Subscription {
    topic: String,
    group: String,
    receiver: mpsc::Receiver<Delivery>,
}

impl Subscription {
    pub(crate) fn new(topic: String, group: String, receiver: mpsc::Receiver<Delivery>) -> Self {
        Self {
            topic,
            group,
            receiver,
        }
    }

    /// Receive the next delivery.
    ///
    /// Returns `None` when the channel has been closed.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    /// Topic this subscription consumes.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Consumer group name.
    pub fn group(&self) -> &str {
        &self.group
    }
}

//! In-memory message bus.
//!
//! Single-process implementation of [`MessageChannel`]: per-(topic, group)
//! bounded queues with consumer-group fan-out. Every subscribed group
//! receives its own copy of each published message; within a group there is
//! a single consumer. Durability and redelivery are the concern of a real
//! broker adapter; this bus exists for single-process deployment and tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::channel::{AckHandle, ChannelError, Delivery, MessageChannel, Subscription};

/// Default per-subscription queue capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

struct GroupQueue {
    group: String,
    sender: mpsc::Sender<Delivery>,
}

/// In-memory pub/sub bus.
pub struct InMemoryBus {
    topics: RwLock<HashMap<String, Vec<GroupQueue>>>,
    capacity: usize,
    closed: AtomicBool,
    published: AtomicU64,
    delivered: AtomicU64,
    acked: Arc<AtomicU64>,
}

impl InMemoryBus {
    /// Create a bus with default queue capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with the given per-subscription queue capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity,
            closed: AtomicBool::new(false),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            acked: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Close the bus.
    ///
    /// Subsequent publishes fail with [`ChannelError::Closed`]; open
    /// subscriptions drain their queues and then end.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.topics.write().clear();
        debug!("In-memory bus closed");
    }

    /// Total messages accepted by `publish`.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Total copies handed to subscriber queues.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Total deliveries acknowledged.
    pub fn acked(&self) -> u64 {
        self.acked.load(Ordering::Relaxed)
    }

    /// Number of consumer groups subscribed to a topic.
    pub fn group_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, Vec::len)
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageChannel for InMemoryBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }

        self.published.fetch_add(1, Ordering::Relaxed);

        // Snapshot senders so no lock is held across the awaits below.
        let senders: Vec<(String, mpsc::Sender<Delivery>)> = {
            let topics = self.topics.read();
            topics
                .get(topic)
                .map(|queues| {
                    queues
                        .iter()
                        .map(|q| (q.group.clone(), q.sender.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };

        if senders.is_empty() {
            debug!(topic = topic, "Published with no subscribers");
            return Ok(());
        }

        let mut stale: Vec<String> = Vec::new();
        for (group, sender) in senders {
            let delivery = Delivery::new(
                topic.to_string(),
                payload.clone(),
                AckHandle::new(Arc::clone(&self.acked)),
            );
            match sender.send(delivery).await {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    // Receiver dropped; prune the queue below.
                    warn!(topic = topic, group = %group, "Subscriber gone, dropping copy");
                    stale.push(group);
                }
            }
        }

        if !stale.is_empty() {
            let mut topics = self.topics.write();
            if let Some(queues) = topics.get_mut(topic) {
                queues.retain(|q| !stale.contains(&q.group));
            }
        }

        Ok(())
    }

    async fn subscribe(&self, topic: &str, group: &str) -> Result<Subscription, ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }

        let (sender, receiver) = mpsc::channel(self.capacity);

        {
            let mut topics = self.topics.write();
            let queues = topics.entry(topic.to_string()).or_default();
            if queues.iter().any(|q| q.group == group) {
                return Err(ChannelError::DuplicateSubscription {
                    topic: topic.to_string(),
                    group: group.to_string(),
                });
            }
            queues.push(GroupQueue {
                group: group.to_string(),
                sender,
            });
        }

        debug!(topic = topic, group = group, "Subscription created");

        Ok(Subscription::new(
            topic.to_string(),
            group.to_string(),
            receiver,
        ))
    }
}

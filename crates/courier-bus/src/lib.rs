//! # courier-bus
//!
//! Message channel abstraction for Courier.
//!
//! The [`MessageChannel`] trait is the seam between the call bridge and
//! whatever broker actually moves bytes: durable pub/sub with consumer-group
//! semantics and per-delivery acknowledgment. [`InMemoryBus`] is the
//! single-process implementation used by the CLI and the test suites; a
//! Kafka/NATS/Dapr adapter would implement the same trait.

pub mod channel;
pub mod memory;

pub use channel::{AckHandle, ChannelError, Delivery, MessageChannel, Subscription};
pub use memory::InMemoryBus;

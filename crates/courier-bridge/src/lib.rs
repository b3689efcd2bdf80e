//! # courier-bridge
//!
//! The async call bridge: converts "publish a request" + "a response arrives
//! later on a different topic" into a single awaitable call with a timeout,
//! keyed by a correlation id.
//!
//! This crate provides:
//! - [`PendingCallStore`] - the correlation registry (the only shared mutable
//!   state in the core)
//! - [`CallBridge`] - `call()` / `deliver()` / `shutdown()`
//! - [`ResponseRouter`] - the inbound dispatch loop feeding `deliver()`
//!
//! Two instances of the bridge exist in a deployed system, one per topic
//! pair: agent→tool calls and tool→LLM sampling. The shape is identical;
//! only [`BridgeConfig`] differs.

pub mod bridge;
pub mod error;
pub mod pending;
pub mod router;

pub use bridge::{BridgeConfig, CallBridge};
pub use error::CallError;
pub use pending::{PendingCallStore, PendingStats};
pub use router::ResponseRouter;

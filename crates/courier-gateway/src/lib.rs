//! # courier-gateway
//!
//! Thin HTTP surface over the bridges:
//! - `GET /health` - liveness
//! - `POST /tools/call` - synchronous tool invocation through the tool bridge
//! - `POST /events` - CloudEvents ingress for externally-brokered response
//!   delivery (the broker POSTs response envelopes here; HTTP 200 is the ack)

pub mod service;

pub use service::{router, serve, GatewayError, GatewayState};

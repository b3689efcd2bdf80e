//! Pending call registry.
//!
//! Maps correlation ids to waiting callers. This is the only shared mutable
//! state in the bridge; every operation on it is a single atomic map action
//! (insert, remove-and-return), so the deliver path and the timeout path of
//! the same call always observe a consistent winner.

use courier_core::CorrelationId;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Terminal state a waiter is resolved with.
#[derive(Debug)]
pub(crate) enum Resolution {
    /// Remote executor returned a success payload.
    Success(Value),
    /// Remote executor reported an error string.
    Failure(String),
    /// The owning bridge was torn down.
    Shutdown,
}

/// One in-flight call issued by this process.
struct PendingCall {
    /// Single-resolution waiter; resolved exactly once or dropped.
    waiter: oneshot::Sender<Resolution>,
    /// Registration time, for diagnostics only.
    issued_at: Instant,
    /// Operation name, for logs and error messages only.
    label: String,
}

/// Counters for the registry, diagnostics only.
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Calls registered.
    pub registered: AtomicU64,
    /// Calls resolved by a delivered response.
    pub completed: AtomicU64,
    /// Records discarded unresolved (timeout loser cleanup, publish failure).
    pub discarded: AtomicU64,
    /// Responses that matched no pending record.
    pub unmatched: AtomicU64,
}

/// Registry of in-flight calls awaiting responses.
pub struct PendingCallStore {
    pending: DashMap<CorrelationId, PendingCall>,
    stats: PendingStats,
}

impl PendingCallStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: PendingStats::default(),
        }
    }

    /// Register a new pending call under a fresh correlation id.
    ///
    /// The record exists before the caller publishes anything, which closes
    /// the race against a response that arrives faster than the publish
    /// returns.
    pub(crate) fn insert(&self, label: &str) -> (CorrelationId, oneshot::Receiver<Resolution>) {
        let correlation_id = CorrelationId::new();
        let (tx, rx) = oneshot::channel();

        self.pending.insert(
            correlation_id,
            PendingCall {
                waiter: tx,
                issued_at: Instant::now(),
                label: label.to_string(),
            },
        );
        self.stats.registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            correlation_id = %correlation_id,
            operation = label,
            "Registered pending call"
        );

        (correlation_id, rx)
    }

    /// Resolve the pending call for `correlation_id` with a response outcome.
    ///
    /// Remove-then-resolve: the record leaves the map before the waiter is
    /// touched, so a concurrent timeout path that fails to remove the same
    /// key knows it must not resolve anything. Returns false when no record
    /// matched (late, duplicate, or foreign response) - an expected,
    /// non-fatal condition.
    pub(crate) fn complete(
        &self,
        correlation_id: CorrelationId,
        outcome: Result<Value, String>,
    ) -> bool {
        let Some((_, call)) = self.pending.remove(&correlation_id) else {
            self.stats.unmatched.fetch_add(1, Ordering::Relaxed);
            warn!(
                correlation_id = %correlation_id,
                "Response for unknown or already-completed request"
            );
            return false;
        };

        let elapsed_ms = call.issued_at.elapsed().as_millis() as u64;
        let resolution = match outcome {
            Ok(value) => Resolution::Success(value),
            Err(message) => Resolution::Failure(message),
        };

        match call.waiter.send(resolution) {
            Ok(()) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    operation = %call.label,
                    elapsed_ms = elapsed_ms,
                    "Resolved pending call"
                );
                true
            }
            Err(_) => {
                // Caller already left the race (timed out between the timer
                // elapsing and its discard); dropping the resolution is the
                // required no-op.
                debug!(
                    correlation_id = %correlation_id,
                    operation = %call.label,
                    "Waiter gone, response dropped"
                );
                false
            }
        }
    }

    /// Remove a record without resolving it.
    ///
    /// Used by the timeout path and by publish-failure cleanup. Returns
    /// false when the record was already gone (the deliver path won).
    pub(crate) fn discard(&self, correlation_id: CorrelationId) -> bool {
        if self.pending.remove(&correlation_id).is_some() {
            self.stats.discarded.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Drain the registry, resolving every waiter with a shutdown failure.
    pub(crate) fn reject_all_shutdown(&self) {
        let keys: Vec<CorrelationId> = self.pending.iter().map(|e| *e.key()).collect();
        for key in keys {
            if let Some((_, call)) = self.pending.remove(&key) {
                debug!(correlation_id = %key, operation = %call.label, "Rejecting pending call on shutdown");
                let _ = call.waiter.send(Resolution::Shutdown);
            }
        }
    }

    /// Number of in-flight calls.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no calls are in flight.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Diagnostic counters.
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

impl Default for PendingCallStore {
    fn default() -> Self {
        Self::new()
    }
}

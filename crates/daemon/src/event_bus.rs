// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort fan-out of lifecycle events.
//!
//! Built on a broadcast channel: each subscriber gets its own bounded
//! buffer, and a subscriber that falls behind loses its own backlog
//! without ever blocking the emitter. Per-emitter FIFO order holds;
//! nothing is promised across emitters.

use swarm_core::{BusEvent, EventEnvelope};
use tokio::sync::broadcast;
use tracing::trace;

/// Buffered events per subscriber before the oldest are dropped.
const SUBSCRIBER_BUFFER: usize = 256;

/// Handle to the shared event bus. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self { tx }
    }

    /// Emit one event. Never blocks; without subscribers it is a no-op.
    pub fn emit(&self, event: BusEvent, timestamp_ms: u64) {
        trace!(?event, "bus emit");
        let _ = self.tx.send(EventEnvelope::new(timestamp_ms, event));
    }

    /// Attach a subscriber. Events emitted before this call are not seen;
    /// every state is also observable via the worker listing.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Current subscriber count, for the health endpoint.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;

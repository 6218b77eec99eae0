// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed lifecycle events fanned out over the event bus.
//!
//! Serializes as `{"type": "worker:state", "data": {...}}`; the bus wraps
//! each event in an [`EventEnvelope`] carrying the monotonic timestamp.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};

/// Events emitted by the supervisor and session layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BusEvent {
    // -- worker --
    #[serde(rename = "worker:state")]
    WorkerState {
        name: String,
        /// Lifecycle state string; also carries the transient
        /// `restarting` status emitted by the health watchdog.
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    #[serde(rename = "worker:added")]
    WorkerAdded { name: String },

    #[serde(rename = "worker:removed")]
    WorkerRemoved { name: String },

    // -- tool --
    #[serde(rename = "tool:call")]
    ToolCall { worker: String, tool: String },

    #[serde(rename = "tool:result")]
    ToolResult {
        worker: String,
        tool: String,
        ok: bool,
        duration_ms: u64,
    },

    // -- session --
    #[serde(rename = "session:opened")]
    SessionOpened { id: SessionId },

    #[serde(rename = "session:closed")]
    SessionClosed { id: SessionId },

    // -- pool --
    #[serde(rename = "pool:scaled")]
    PoolScaled { base: String, size: usize },
}

/// Wire envelope for one bus event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub monotonic_timestamp_ms: u64,
    #[serde(flatten)]
    pub event: BusEvent,
}

impl EventEnvelope {
    pub fn new(monotonic_timestamp_ms: u64, event: BusEvent) -> Self {
        Self { monotonic_timestamp_ms, event }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

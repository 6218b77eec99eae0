// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response correlation shared by the stream-oriented adapters.

use crate::ClientError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use swarm_core::ToolDescriptor;
use swarm_wire::{CallToolResult, JsonRpcResponse, ListToolsResult, RequestId};
use tokio::sync::oneshot;

/// Outstanding requests awaiting a response from the peer.
#[derive(Debug, Default)]
pub(crate) struct PendingMap {
    next_id: AtomicI64,
    pending: Mutex<HashMap<RequestId, oneshot::Sender<JsonRpcResponse>>>,
}

impl PendingMap {
    pub(crate) fn new() -> Self {
        Self { next_id: AtomicI64::new(1), pending: Mutex::new(HashMap::new()) }
    }

    /// Allocate an id and register a waiter for its response.
    pub(crate) fn register(&self) -> (RequestId, oneshot::Receiver<JsonRpcResponse>) {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), tx);
        (id, rx)
    }

    /// Route an inbound response to its waiter. False if nobody waits.
    pub(crate) fn resolve(&self, response: JsonRpcResponse) -> bool {
        match self.pending.lock().remove(&response.id) {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Forget a waiter (timeout or caller abandonment).
    pub(crate) fn forget(&self, id: &RequestId) {
        self.pending.lock().remove(id);
    }

    /// Drop every waiter; their receivers observe a closed channel.
    pub(crate) fn fail_all(&self) {
        self.pending.lock().clear();
    }
}

/// Unwrap a response into its result value, mapping peer errors.
pub(crate) fn into_result(response: JsonRpcResponse) -> Result<serde_json::Value, ClientError> {
    if let Some(err) = response.error {
        return Err(ClientError::Worker(err.message));
    }
    Ok(response.result.unwrap_or(serde_json::Value::Null))
}

/// Parse a `tools/list` result value.
pub(crate) fn parse_tools(value: serde_json::Value) -> Result<Vec<ToolDescriptor>, ClientError> {
    let result: ListToolsResult = serde_json::from_value(value)
        .map_err(|e| ClientError::Protocol(format!("bad tools/list result: {e}")))?;
    Ok(result.tools)
}

/// Parse a `tools/call` result value.
pub(crate) fn parse_call_result(value: serde_json::Value) -> Result<CallToolResult, ClientError> {
    serde_json::from_value(value)
        .map_err(|e| ClientError::Protocol(format!("bad tools/call result: {e}")))
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;

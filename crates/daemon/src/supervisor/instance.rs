// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live instance bookkeeping.

use parking_lot::Mutex;
use std::sync::Arc;
use swarm_client::WorkerClient;
use swarm_core::{InstanceSnapshot, ToolDescriptor, WorkerConfig, WorkerState};

struct InstanceData {
    config: WorkerConfig,
    state: WorkerState,
    client: Option<Arc<dyn WorkerClient>>,
    process_id: Option<u32>,
    cached_tools: Vec<ToolDescriptor>,
    last_error: Option<String>,
    reconnect_count: u32,
    busy: bool,
    last_active_at: u64,
}

/// One live attempt to run a worker.
///
/// The cell owns the client handle; the `call_gate` keeps at most one
/// call in flight per instance.
pub struct InstanceCell {
    pub internal_name: String,
    pub base_name: String,
    pub index: u32,
    /// Serializes tool calls on this instance.
    pub call_gate: tokio::sync::Mutex<()>,
    data: Mutex<InstanceData>,
}

impl InstanceCell {
    pub fn new(
        internal_name: String,
        base_name: String,
        index: u32,
        config: WorkerConfig,
        now_ms: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            internal_name,
            base_name,
            index,
            call_gate: tokio::sync::Mutex::new(()),
            data: Mutex::new(InstanceData {
                config,
                state: WorkerState::Connecting,
                client: None,
                process_id: None,
                cached_tools: Vec::new(),
                last_error: None,
                reconnect_count: 0,
                busy: false,
                last_active_at: now_ms,
            }),
        })
    }

    pub fn config(&self) -> WorkerConfig {
        self.data.lock().config.clone()
    }

    pub fn state(&self) -> WorkerState {
        self.data.lock().state
    }

    pub fn set_state(&self, state: WorkerState) {
        self.data.lock().state = state;
    }

    pub fn client(&self) -> Option<Arc<dyn WorkerClient>> {
        self.data.lock().client.clone()
    }

    /// Transition into CONNECTED with a fresh client.
    pub fn set_connected(&self, client: Arc<dyn WorkerClient>, process_id: Option<u32>) {
        let mut data = self.data.lock();
        data.state = WorkerState::Connected;
        data.client = Some(client);
        data.process_id = process_id;
        data.last_error = None;
    }

    /// Transition into ERROR, dropping the client handle.
    pub fn set_error(&self, message: impl Into<String>) {
        let mut data = self.data.lock();
        data.state = WorkerState::Error;
        data.client = None;
        data.last_error = Some(message.into());
    }

    pub fn last_error(&self) -> Option<String> {
        self.data.lock().last_error.clone()
    }

    pub fn process_id(&self) -> Option<u32> {
        self.data.lock().process_id
    }

    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.data.lock().cached_tools.clone()
    }

    pub fn set_tools(&self, tools: Vec<ToolDescriptor>) {
        self.data.lock().cached_tools = tools;
    }

    pub fn reconnect_count(&self) -> u32 {
        self.data.lock().reconnect_count
    }

    pub fn set_reconnect_count(&self, count: u32) {
        self.data.lock().reconnect_count = count;
    }

    pub fn bump_reconnect_count(&self) -> u32 {
        let mut data = self.data.lock();
        data.reconnect_count += 1;
        data.reconnect_count
    }

    pub fn is_busy(&self) -> bool {
        self.data.lock().busy
    }

    pub fn set_busy(&self, busy: bool) {
        self.data.lock().busy = busy;
    }

    pub fn last_active_at(&self) -> u64 {
        self.data.lock().last_active_at
    }

    pub fn touch(&self, now_ms: u64) {
        self.data.lock().last_active_at = now_ms;
    }

    pub fn is_stateful(&self) -> bool {
        self.data.lock().config.stateful
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        let data = self.data.lock();
        InstanceSnapshot {
            internal_name: self.internal_name.clone(),
            base_name: self.base_name.clone(),
            index: self.index,
            transport: data.config.transport,
            state: data.state,
            process_id: data.process_id,
            cached_tools: data.cached_tools.clone(),
            last_error: data.last_error.clone(),
            reconnect_count: data.reconnect_count,
            stateful: data.config.stateful,
            busy: data.busy,
            last_active_at: data.last_active_at,
        }
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;

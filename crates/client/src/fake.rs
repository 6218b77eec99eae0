// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted fakes for supervisor and session-layer tests.

use crate::{ClientError, ClientEvent, ClientFactory, WorkerClient};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swarm_core::{ToolDescriptor, Transport, WorkerConfig};
use swarm_wire::CallToolResult;
use tokio::sync::mpsc;

/// One scripted call record.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub tool: String,
    pub args: Value,
}

/// A worker client whose behavior is scripted by the test.
pub struct FakeWorkerClient {
    name: String,
    pid: Option<u32>,
    tools: Mutex<Vec<ToolDescriptor>>,
    calls: Mutex<Vec<RecordedCall>>,
    call_delay: Mutex<Duration>,
    call_error: Mutex<Option<ClientError>>,
    list_fails: AtomicBool,
    stderr: Mutex<Vec<String>>,
    closed: AtomicBool,
    events: mpsc::Sender<ClientEvent>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeWorkerClient {
    fn new(
        name: String,
        pid: Option<u32>,
        tools: Vec<ToolDescriptor>,
        call_delay: Duration,
        events: mpsc::Sender<ClientEvent>,
    ) -> Self {
        Self {
            name,
            pid,
            tools: Mutex::new(tools),
            calls: Mutex::new(Vec::new()),
            call_delay: Mutex::new(call_delay),
            call_error: Mutex::new(None),
            list_fails: AtomicBool::new(false),
            stderr: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            events,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Simulate the transport dying; delivers `Closed` to the owner.
    pub async fn trigger_closed(&self) {
        let _ = self.events.send(ClientEvent::Closed).await;
    }

    /// Simulate a tools_changed announcement with the new list.
    pub async fn trigger_tools_changed(&self, tools: Vec<ToolDescriptor>) {
        *self.tools.lock() = tools.clone();
        let _ = self.events.send(ClientEvent::ToolsChanged(tools)).await;
    }

    pub fn set_stderr(&self, lines: Vec<String>) {
        *self.stderr.lock() = lines;
    }

    pub fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.lock() = delay;
    }

    pub fn set_call_error(&self, error: ClientError) {
        *self.call_error.lock() = Some(error);
    }

    pub fn fail_list_tools(&self) {
        self.list_fails.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping calls observed; the per-instance
    /// busy gate should keep this at 1.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerClient for FakeWorkerClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ClientError> {
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(ClientError::Worker("list_tools scripted to fail".into()));
        }
        Ok(self.tools.lock().clone())
    }

    async fn call_tool(
        &self,
        tool: &str,
        args: Value,
        timeout: Duration,
    ) -> Result<CallToolResult, ClientError> {
        self.calls.lock().push(RecordedCall { tool: tool.to_string(), args });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.call_delay.lock();
        let outcome = if delay > timeout {
            tokio::time::sleep(timeout).await;
            Err(ClientError::Timeout(format!("{tool} exceeded {}s", timeout.as_secs())))
        } else {
            tokio::time::sleep(delay).await;
            match self.call_error.lock().clone() {
                Some(err) => Err(err),
                None => Ok(CallToolResult::text(format!("{}:{tool} ok", self.name))),
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn process_id(&self) -> Option<u32> {
        self.pid
    }

    fn stderr_tail(&self) -> Vec<String> {
        self.stderr.lock().clone()
    }
}

#[derive(Default)]
struct FactoryState {
    default_tools: Vec<ToolDescriptor>,
    call_delay: Duration,
    fail_connect: HashMap<String, String>,
    connect_count: HashMap<String, usize>,
    clients: HashMap<String, Arc<FakeWorkerClient>>,
    next_pid: u32,
}

/// Factory handing out [`FakeWorkerClient`]s, scripted per worker name.
#[derive(Clone)]
pub struct FakeClientFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl Default for FakeClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClientFactory {
    pub fn new() -> Self {
        let factory = Self { state: Arc::new(Mutex::new(FactoryState::default())) };
        factory.state.lock().next_pid = 10_000;
        factory.set_default_tools(vec![ToolDescriptor {
            name: "echo".into(),
            description: Some("echo a message".into()),
            input_schema: serde_json::json!({ "type": "object" }),
        }]);
        factory
    }

    pub fn set_default_tools(&self, tools: Vec<ToolDescriptor>) {
        self.state.lock().default_tools = tools;
    }

    pub fn set_call_delay(&self, delay: Duration) {
        self.state.lock().call_delay = delay;
    }

    /// Make every future connect for `name` fail with `Unreachable(msg)`.
    pub fn fail_connect(&self, name: &str, msg: &str) {
        self.state.lock().fail_connect.insert(name.to_string(), msg.to_string());
    }

    /// Let future connects for `name` succeed again.
    pub fn allow_connect(&self, name: &str) {
        self.state.lock().fail_connect.remove(name);
    }

    pub fn connect_count(&self, name: &str) -> usize {
        self.state.lock().connect_count.get(name).copied().unwrap_or(0)
    }

    /// The most recent client connected under `name`.
    pub fn client(&self, name: &str) -> Option<Arc<FakeWorkerClient>> {
        self.state.lock().clients.get(name).cloned()
    }

    /// Names of every client ever connected.
    pub fn connected_names(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut names: Vec<String> = state.clients.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ClientFactory for FakeClientFactory {
    async fn connect(
        &self,
        config: &WorkerConfig,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<Arc<dyn WorkerClient>, ClientError> {
        let client = {
            let mut state = self.state.lock();
            *state.connect_count.entry(config.name.clone()).or_insert(0) += 1;

            if let Some(msg) = state.fail_connect.get(&config.name) {
                return Err(ClientError::Unreachable(msg.clone()));
            }

            let pid = (config.transport == Transport::Local).then(|| {
                state.next_pid += 1;
                state.next_pid
            });
            let client = Arc::new(FakeWorkerClient::new(
                config.name.clone(),
                pid,
                state.default_tools.clone(),
                state.call_delay,
                events,
            ));
            state.clients.insert(config.name.clone(), Arc::clone(&client));
            client
        };
        Ok(client as Arc<dyn WorkerClient>)
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child-process transport over standard streams.
//!
//! The client exclusively owns the child process, its pipes, and the
//! stderr ring. Requests go out over stdin, responses and notifications
//! come back over stdout, and stderr is folded into a bounded ring for
//! failure diagnosis.

use crate::pending::{into_result, parse_call_result, parse_tools, PendingMap};
use crate::stderr_ring::StderrRing;
use crate::{ClientError, ClientEvent, WorkerClient, CLOSE_TIMEOUT, CONNECT_TIMEOUT};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swarm_core::{ToolDescriptor, WorkerConfig};
use swarm_wire::{
    method, read_message, write_message, CallToolResult, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, RpcError,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Tool-call client backed by a spawned child process.
pub struct StdioClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StdioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioClient")
            .field("name", &self.inner.name)
            .field("pid", &self.inner.pid)
            .finish()
    }
}

struct Inner {
    name: String,
    pid: Option<u32>,
    child: Mutex<Option<Child>>,
    outbound: mpsc::Sender<JsonRpcMessage>,
    pending: PendingMap,
    stderr: Arc<StderrRing>,
    events: mpsc::Sender<ClientEvent>,
    /// Set by an explicit `close()`; suppresses the Closed event.
    closing: AtomicBool,
    closed_emitted: AtomicBool,
}

impl StdioClient {
    /// Spawn the configured command and run the initialize handshake.
    pub async fn connect(
        config: &WorkerConfig,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<Self, ClientError> {
        let command = config
            .command
            .as_deref()
            .ok_or_else(|| ClientError::Protocol("local worker without command".into()))?;

        let mut cmd = Command::new(command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ClientError::Unreachable(format!("spawn '{command}': {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::Protocol("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::Protocol("child stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ClientError::Protocol("child stderr unavailable".into()))?;

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<JsonRpcMessage>(64);
        let ring = Arc::new(StderrRing::new());
        let inner = Arc::new(Inner {
            name: config.name.clone(),
            pid: child.id(),
            child: Mutex::new(Some(child)),
            outbound: outbound_tx,
            pending: PendingMap::new(),
            stderr: Arc::clone(&ring),
            events,
            closing: AtomicBool::new(false),
            closed_emitted: AtomicBool::new(false),
        });

        // Stderr reader: newline-split, truncated, ring-buffered.
        {
            let ring = Arc::clone(&ring);
            let name = inner.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(worker = %name, "stderr: {line}");
                    ring.push(&line);
                }
            });
        }

        // Writer: serializes every outbound message onto stdin.
        {
            let mut stdin = stdin;
            let name = inner.name.clone();
            tokio::spawn(async move {
                while let Some(message) = outbound_rx.recv().await {
                    if let Err(e) = write_message(&mut stdin, &message).await {
                        debug!(worker = %name, "stdin write failed: {e}");
                        break;
                    }
                }
            });
        }

        // Reader: routes responses, answers pings, forwards notifications.
        {
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stdout);
                loop {
                    match read_message(&mut reader).await {
                        Ok(Some(message)) => inner.handle_inbound(message).await,
                        Ok(None) => break,
                        Err(e) => {
                            debug!(worker = %inner.name, "stdout read failed: {e}");
                            break;
                        }
                    }
                }
                inner.emit_closed().await;
            });
        }

        let client = Self { inner };
        client.inner.handshake().await?;
        Ok(client)
    }
}

impl Inner {
    async fn handshake(self: &Arc<Self>) -> Result<(), ClientError> {
        self.request(
            method::INITIALIZE,
            Some(swarm_wire::initialize_params("swarm", env!("CARGO_PKG_VERSION"))),
            CONNECT_TIMEOUT,
        )
        .await?;
        self.send(JsonRpcNotification::new(method::INITIALIZED, None).into()).await
    }

    async fn send(&self, message: JsonRpcMessage) -> Result<(), ClientError> {
        self.outbound.send(message).await.map_err(|_| ClientError::Closed)
    }

    async fn request(
        self: &Arc<Self>,
        rpc_method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, ClientError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(ClientError::Cancelled);
        }
        let (id, rx) = self.pending.register();
        self.send(JsonRpcRequest::new(id.clone(), rpc_method, params).into()).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => into_result(response),
            Ok(Err(_)) => Err(ClientError::Closed),
            Err(_) => {
                self.pending.forget(&id);
                Err(ClientError::Timeout(format!(
                    "{rpc_method} exceeded {}s",
                    timeout.as_secs()
                )))
            }
        }
    }

    async fn handle_inbound(self: &Arc<Self>, message: JsonRpcMessage) {
        match message {
            JsonRpcMessage::Response(response) => {
                if !self.pending.resolve(response) {
                    debug!(worker = %self.name, "response for unknown request id");
                }
            }
            JsonRpcMessage::Notification(n) if n.method == method::TOOLS_CHANGED => {
                // The notification has no payload; re-list and forward the
                // authoritative result.
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    match inner.fetch_tools().await {
                        Ok(tools) => {
                            let _ = inner.events.send(ClientEvent::ToolsChanged(tools)).await;
                        }
                        Err(e) => warn!(worker = %inner.name, "tools refresh failed: {e}"),
                    }
                });
            }
            JsonRpcMessage::Notification(n) => {
                debug!(worker = %self.name, method = %n.method, "ignoring notification");
            }
            JsonRpcMessage::Request(request) => {
                // Workers rarely call back; answer pings, refuse the rest.
                let reply = if request.method == method::PING {
                    JsonRpcResponse::ok(request.id, serde_json::json!({}))
                } else {
                    JsonRpcResponse::err(request.id, RpcError::method_not_found(&request.method))
                };
                let _ = self.send(reply.into()).await;
            }
        }
    }

    async fn fetch_tools(self: &Arc<Self>) -> Result<Vec<ToolDescriptor>, ClientError> {
        let value = self.request(method::TOOLS_LIST, None, CONNECT_TIMEOUT).await?;
        parse_tools(value)
    }

    async fn emit_closed(&self) {
        self.pending.fail_all();
        if self.closing.load(Ordering::SeqCst) {
            return;
        }
        if !self.closed_emitted.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(ClientEvent::Closed).await;
        }
    }
}

#[async_trait]
impl WorkerClient for StdioClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ClientError> {
        self.inner.fetch_tools().await
    }

    async fn call_tool(
        &self,
        tool: &str,
        args: Value,
        timeout: Duration,
    ) -> Result<CallToolResult, ClientError> {
        let params = serde_json::json!({ "name": tool, "arguments": args });
        let value = self.inner.request(method::TOOLS_CALL, Some(params), timeout).await?;
        parse_call_result(value)
    }

    async fn close(&self) {
        self.inner.closing.store(true, Ordering::SeqCst);
        self.inner.pending.fail_all();

        let inner = Arc::clone(&self.inner);
        let shutdown = async move {
            let mut guard = inner.child.lock().await;
            if let Some(mut child) = guard.take() {
                if let Err(e) = child.start_kill() {
                    debug!(worker = %inner.name, "kill failed: {e}");
                }
                if let Err(e) = child.wait().await {
                    debug!(worker = %inner.name, "wait failed: {e}");
                }
            }
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await.is_err() {
            warn!(worker = %self.inner.name, "close exceeded {}s", CLOSE_TIMEOUT.as_secs());
        }
    }

    fn process_id(&self) -> Option<u32> {
        self.inner.pid
    }

    fn stderr_tail(&self) -> Vec<String> {
        self.inner.stderr.tail()
    }
}

#[cfg(test)]
#[path = "stdio_tests.rs"]
mod tests;

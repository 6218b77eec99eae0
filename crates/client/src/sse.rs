// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server-sent-event HTTP transport.
//!
//! The legacy two-channel arrangement: one long-lived GET stream carries
//! server-to-client messages, and the first `endpoint` event names the
//! URL client-to-server messages are POSTed to.

use crate::pending::{into_result, parse_call_result, parse_tools, PendingMap};
use crate::{ClientError, ClientEvent, WorkerClient, CLOSE_TIMEOUT, CONNECT_TIMEOUT};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swarm_core::{ToolDescriptor, WorkerConfig};
use swarm_wire::{method, CallToolResult, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

/// One parsed server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub name: String,
    pub data: String,
}

/// Incremental SSE frame decoder. Feed raw bytes, get completed events.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: String,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));
        let mut events = Vec::new();
        // A blank line terminates one event.
        while let Some(end) = find_frame_end(&self.buf) {
            let frame: String = self.buf.drain(..end.consumed).collect();
            if let Some(event) = parse_frame(&frame[..end.frame_len]) {
                events.push(event);
            }
        }
        events
    }
}

struct FrameEnd {
    frame_len: usize,
    consumed: usize,
}

fn find_frame_end(buf: &str) -> Option<FrameEnd> {
    let lf = buf.find("\n\n").map(|i| FrameEnd { frame_len: i, consumed: i + 2 });
    let crlf = buf.find("\r\n\r\n").map(|i| FrameEnd { frame_len: i, consumed: i + 4 });
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.frame_len <= b.frame_len { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut name = "message".to_string();
    let mut data_lines: Vec<&str> = Vec::new();
    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            name = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
        // Comment (`:`) and id/retry fields are ignored.
    }
    if data_lines.is_empty() && name == "message" {
        return None;
    }
    Some(SseEvent { name, data: data_lines.join("\n") })
}

/// Tool-call client backed by an SSE endpoint.
pub struct SseClient {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    http: reqwest::Client,
    headers: Vec<(String, String)>,
    /// POST target announced by the server's `endpoint` event.
    endpoint: String,
    pending: PendingMap,
    events: mpsc::Sender<ClientEvent>,
    closing: AtomicBool,
    closed_emitted: AtomicBool,
    stream_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SseClient {
    /// Open the event stream, learn the POST endpoint, and handshake.
    pub async fn connect(
        config: &WorkerConfig,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<Self, ClientError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| ClientError::Protocol("sse worker without url".into()))?
            .to_string();
        let headers: Vec<(String, String)> =
            config.headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let http = reqwest::Client::new();
        let mut request = http.get(&url).header("Accept", "text/event-stream");
        for (key, value) in &headers {
            request = request.header(key, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Unreachable(format!("GET {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(ClientError::Unreachable(format!(
                "GET {url}: HTTP {}",
                response.status()
            )));
        }

        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();
        let (inbound_tx, mut inbound_rx) = mpsc::channel::<SseEvent>(64);

        // Stream pump: decode frames off the byte stream until it ends.
        let pump = {
            let name = config.name.clone();
            tokio::spawn(async move {
                let mut decoder = SseDecoder::default();
                let mut endpoint_tx = Some(endpoint_tx);
                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    let chunk = match chunk {
                        Ok(c) => c,
                        Err(e) => {
                            debug!(worker = %name, "sse stream error: {e}");
                            break;
                        }
                    };
                    for event in decoder.push(&chunk) {
                        if event.name == "endpoint" {
                            if let Some(tx) = endpoint_tx.take() {
                                let _ = tx.send(event.data);
                            }
                        } else if inbound_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            })
        };

        let endpoint_path = endpoint_rx
            .await
            .map_err(|_| ClientError::Protocol("stream ended before endpoint event".into()))?;
        let endpoint = resolve_endpoint(&url, &endpoint_path)?;

        let inner = Arc::new(Inner {
            name: config.name.clone(),
            http,
            headers,
            endpoint,
            pending: PendingMap::new(),
            events,
            closing: AtomicBool::new(false),
            closed_emitted: AtomicBool::new(false),
            stream_task: Mutex::new(Some(pump)),
        });

        // Inbound router: message events feed the pending map.
        {
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                while let Some(event) = inbound_rx.recv().await {
                    inner.handle_event(event).await;
                }
                inner.emit_closed().await;
            });
        }

        let client = Self { inner };
        client.inner.handshake().await?;
        Ok(client)
    }
}

/// Resolve the (possibly relative) endpoint URI against the stream URL.
fn resolve_endpoint(base: &str, endpoint: &str) -> Result<String, ClientError> {
    let base = reqwest::Url::parse(base)
        .map_err(|e| ClientError::Protocol(format!("bad sse url: {e}")))?;
    let resolved = base
        .join(endpoint)
        .map_err(|e| ClientError::Protocol(format!("bad endpoint '{endpoint}': {e}")))?;
    Ok(resolved.to_string())
}

impl Inner {
    async fn handshake(self: &Arc<Self>) -> Result<(), ClientError> {
        self.request(
            method::INITIALIZE,
            Some(swarm_wire::initialize_params("swarm", env!("CARGO_PKG_VERSION"))),
            CONNECT_TIMEOUT,
        )
        .await?;
        self.post(&JsonRpcNotification::new(method::INITIALIZED, None).into()).await
    }

    async fn post(&self, message: &JsonRpcMessage) -> Result<(), ClientError> {
        let mut request = self.http.post(&self.endpoint).json(message);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Unreachable(format!("POST {}: {e}", self.endpoint)))?;
        if !response.status().is_success() {
            return Err(ClientError::Worker(format!(
                "POST {}: HTTP {}",
                self.endpoint,
                response.status()
            )));
        }
        Ok(())
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
        self.post(&JsonRpcRequest::new(id.clone(), rpc_method, params).into()).await?;

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

    async fn handle_event(self: &Arc<Self>, event: SseEvent) {
        let message: JsonRpcMessage = match serde_json::from_str(&event.data) {
            Ok(m) => m,
            Err(e) => {
                debug!(worker = %self.name, "bad sse payload: {e}");
                return;
            }
        };
        match message {
            JsonRpcMessage::Response(response) => {
                if !self.pending.resolve(response) {
                    debug!(worker = %self.name, "response for unknown request id");
                }
            }
            JsonRpcMessage::Notification(n) if n.method == method::TOOLS_CHANGED => {
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
            other => {
                debug!(worker = %self.name, method = ?other.method(), "ignoring message");
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
impl WorkerClient for SseClient {
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
            if let Some(task) = inner.stream_task.lock().await.take() {
                task.abort();
            }
        };
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await;
    }
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod tests;

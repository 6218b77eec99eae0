// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bidirectional streamable HTTP transport.
//!
//! Every client-to-server message is a POST to the single endpoint; the
//! response body is either a plain JSON message or a short SSE stream
//! containing it. A long-lived GET stream (where the server offers one)
//! delivers server-initiated notifications. The session id issued at
//! initialize time rides the `Mcp-Session-Id` header both ways.

use crate::pending::{into_result, parse_call_result, parse_tools};
use crate::sse::SseDecoder;
use crate::{ClientError, ClientEvent, WorkerClient, CLOSE_TIMEOUT, CONNECT_TIMEOUT};
use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swarm_core::{ToolDescriptor, WorkerConfig};
use swarm_wire::{
    method, CallToolResult, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId, SESSION_HEADER,
};
use tracing::{debug, warn};

/// Tool-call client backed by a streamable HTTP endpoint.
pub struct StreamableClient {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    http: reqwest::Client,
    url: String,
    headers: Vec<(String, String)>,
    session: Mutex<Option<String>>,
    next_id: AtomicI64,
    events: tokio::sync::mpsc::Sender<ClientEvent>,
    closing: AtomicBool,
    closed_emitted: AtomicBool,
    listen_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StreamableClient {
    /// POST the initialize handshake and start the notification stream.
    pub async fn connect(
        config: &WorkerConfig,
        events: tokio::sync::mpsc::Sender<ClientEvent>,
    ) -> Result<Self, ClientError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| ClientError::Protocol("streamable worker without url".into()))?
            .to_string();

        let inner = Arc::new(Inner {
            name: config.name.clone(),
            http: reqwest::Client::new(),
            url,
            headers: config.headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            session: Mutex::new(None),
            next_id: AtomicI64::new(1),
            events,
            closing: AtomicBool::new(false),
            closed_emitted: AtomicBool::new(false),
            listen_task: Mutex::new(None),
        });

        inner
            .request(
                method::INITIALIZE,
                Some(swarm_wire::initialize_params("swarm", env!("CARGO_PKG_VERSION"))),
                CONNECT_TIMEOUT,
            )
            .await?;
        inner.notify(method::INITIALIZED).await?;

        // Server-initiated notifications come over an optional GET stream;
        // servers that do not offer one respond 4xx and we carry on.
        let task = {
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                inner.listen().await;
            })
        };
        *inner.listen_task.lock() = Some(task);

        Ok(Self { inner })
    }
}

impl Inner {
    fn apply_headers(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        if let Some(session) = self.session.lock().clone() {
            request = request.header(SESSION_HEADER, session);
        }
        request
    }

    async fn post(&self, message: &JsonRpcMessage) -> Result<reqwest::Response, ClientError> {
        let request = self
            .apply_headers(self.http.post(&self.url))
            .header("Accept", "application/json, text/event-stream")
            .json(message);
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Unreachable(format!("POST {}: {e}", self.url)))?;

        // Capture or refresh the session id issued by the server.
        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session.lock() = Some(session.to_string());
        }
        Ok(response)
    }

    async fn notify(&self, rpc_method: &str) -> Result<(), ClientError> {
        let message: JsonRpcMessage = JsonRpcNotification::new(rpc_method, None).into();
        let response = self.post(&message).await?;
        if !response.status().is_success() {
            return Err(ClientError::Worker(format!(
                "notification {rpc_method}: HTTP {}",
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
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let message: JsonRpcMessage =
            JsonRpcRequest::new(id.clone(), rpc_method, params).into();

        let round_trip = async {
            let response = self.post(&message).await?;
            let status = response.status();
            if !status.is_success() {
                let err = ClientError::Worker(format!("POST {}: HTTP {status}", self.url));
                if status == reqwest::StatusCode::NOT_FOUND {
                    // Session evicted server-side; the transport is done.
                    self.emit_closed().await;
                }
                return Err(err);
            }
            self.read_response(response, &id).await
        };

        match tokio::time::timeout(timeout, round_trip).await {
            Ok(result) => result.and_then(into_result),
            Err(_) => Err(ClientError::Timeout(format!(
                "{rpc_method} exceeded {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// Pull the matching response out of a JSON or SSE response body.
    async fn read_response(
        self: &Arc<Self>,
        response: reqwest::Response,
        id: &RequestId,
    ) -> Result<JsonRpcResponse, ClientError> {
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("text/event-stream") {
            let mut decoder = SseDecoder::default();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk =
                    chunk.map_err(|e| ClientError::Unreachable(format!("stream: {e}")))?;
                for event in decoder.push(&chunk) {
                    match serde_json::from_str::<JsonRpcMessage>(&event.data) {
                        Ok(JsonRpcMessage::Response(r)) if &r.id == id => return Ok(r),
                        Ok(other) => self.handle_server_message(other).await,
                        Err(e) => debug!(worker = %self.name, "bad frame: {e}"),
                    }
                }
            }
            Err(ClientError::Protocol("stream ended without a response".into()))
        } else {
            let body = response
                .bytes()
                .await
                .map_err(|e| ClientError::Unreachable(format!("body: {e}")))?;
            serde_json::from_slice::<JsonRpcResponse>(&body)
                .map_err(|e| ClientError::Protocol(format!("bad response body: {e}")))
        }
    }

    /// Long-lived GET stream for server-initiated messages.
    async fn listen(self: &Arc<Self>) {
        let request = self
            .apply_headers(self.http.get(&self.url))
            .header("Accept", "text/event-stream");
        let response = match request.send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(worker = %self.name, status = %r.status(), "no notification stream");
                return;
            }
            Err(e) => {
                debug!(worker = %self.name, "notification stream failed: {e}");
                return;
            }
        };

        let mut decoder = SseDecoder::default();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    debug!(worker = %self.name, "notification stream error: {e}");
                    break;
                }
            };
            for event in decoder.push(&chunk) {
                match serde_json::from_str::<JsonRpcMessage>(&event.data) {
                    Ok(message) => self.handle_server_message(message).await,
                    Err(e) => debug!(worker = %self.name, "bad frame: {e}"),
                }
            }
        }
        self.emit_closed().await;
    }

    fn handle_server_message<'a>(
        self: &'a Arc<Self>,
        message: JsonRpcMessage,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(self.handle_server_message_inner(message))
    }

    async fn handle_server_message_inner(self: &Arc<Self>, message: JsonRpcMessage) {
        if let JsonRpcMessage::Notification(n) = &message {
            if n.method == method::TOOLS_CHANGED {
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    match inner.fetch_tools().await {
                        Ok(tools) => {
                            let _ = inner.events.send(ClientEvent::ToolsChanged(tools)).await;
                        }
                        Err(e) => warn!(worker = %inner.name, "tools refresh failed: {e}"),
                    }
                });
                return;
            }
        }
        debug!(worker = %self.name, method = ?message.method(), "ignoring message");
    }

    async fn fetch_tools(self: &Arc<Self>) -> Result<Vec<ToolDescriptor>, ClientError> {
        let value = self.request(method::TOOLS_LIST, None, CONNECT_TIMEOUT).await?;
        parse_tools(value)
    }

    async fn emit_closed(&self) {
        if self.closing.load(Ordering::SeqCst) {
            return;
        }
        if !self.closed_emitted.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(ClientEvent::Closed).await;
        }
    }
}

#[async_trait]
impl WorkerClient for StreamableClient {
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
        if let Some(task) = self.inner.listen_task.lock().take() {
            task.abort();
        }

        // Best-effort session teardown.
        let inner = Arc::clone(&self.inner);
        let teardown = async move {
            if inner.session.lock().is_some() {
                let request = inner.apply_headers(inner.http.delete(&inner.url));
                if let Err(e) = request.send().await {
                    debug!(worker = %inner.name, "session delete failed: {e}");
                }
            }
        };
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, teardown).await;
    }
}

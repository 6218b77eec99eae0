// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Worker transport clients.
//!
//! Three adapters speak the tool-call protocol to a managed worker:
//! a child process over standard streams, a server-sent-event HTTP
//! endpoint, and a bidirectional streamable HTTP endpoint. All expose
//! the same [`WorkerClient`] capability set; they differ only in how the
//! connection is constructed and in whether there is a child PID and a
//! stderr stream.
//!
//! Adapter-side notifications (tool list changes, transport loss) are
//! delivered over the `mpsc::Sender<ClientEvent>` handed to [`connect`].

mod pending;
mod sse;
mod stderr_ring;
mod stdio;
mod streamable;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use sse::SseClient;
pub use stderr_ring::StderrRing;
pub use stdio::StdioClient;
pub use streamable::StreamableClient;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use swarm_core::{ToolDescriptor, Transport, WorkerConfig};
use swarm_wire::CallToolResult;
use thiserror::Error;
use tokio::sync::mpsc;

/// Hard cap on transport establishment.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Budget for best-effort close.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default per-call budget when the caller does not override it.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from worker client operations.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("worker unreachable: {0}")]
    Unreachable(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Worker(String),

    #[error("transport closed")]
    Closed,
}

/// Notifications pushed by an adapter to its owner.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The peer announced a new tool list; the payload is authoritative.
    ToolsChanged(Vec<ToolDescriptor>),
    /// The transport became unusable. Sent at most once per connection.
    Closed,
}

/// Capability set shared by all transport adapters.
#[async_trait]
pub trait WorkerClient: Send + Sync + 'static {
    /// Fetch the authoritative tool list.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ClientError>;

    /// Invoke one tool. `timeout` bounds the whole round trip.
    async fn call_tool(
        &self,
        tool: &str,
        args: Value,
        timeout: Duration,
    ) -> Result<CallToolResult, ClientError>;

    /// Best-effort shutdown, bounded by [`CLOSE_TIMEOUT`]. Always succeeds.
    async fn close(&self);

    /// Child PID, LOCAL transport only.
    fn process_id(&self) -> Option<u32> {
        None
    }

    /// Recent stderr lines, LOCAL transport only.
    fn stderr_tail(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Constructs clients for worker configs; the seam tests fake out.
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    async fn connect(
        &self,
        config: &WorkerConfig,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<Arc<dyn WorkerClient>, ClientError>;
}

/// Production factory dispatching on the config's transport.
#[derive(Clone, Default)]
pub struct TransportFactory;

#[async_trait]
impl ClientFactory for TransportFactory {
    async fn connect(
        &self,
        config: &WorkerConfig,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<Arc<dyn WorkerClient>, ClientError> {
        connect(config, events).await
    }
}

/// Establish a transport for `config`, bounded by [`CONNECT_TIMEOUT`].
pub async fn connect(
    config: &WorkerConfig,
    events: mpsc::Sender<ClientEvent>,
) -> Result<Arc<dyn WorkerClient>, ClientError> {
    let connecting = async {
        match config.transport {
            Transport::Local => StdioClient::connect(config, events)
                .await
                .map(|c| Arc::new(c) as Arc<dyn WorkerClient>),
            Transport::StreamSse => SseClient::connect(config, events)
                .await
                .map(|c| Arc::new(c) as Arc<dyn WorkerClient>),
            Transport::StreamHttp => StreamableClient::connect(config, events)
                .await
                .map(|c| Arc::new(c) as Arc<dyn WorkerClient>),
        }
    };
    tokio::time::timeout(CONNECT_TIMEOUT, connecting)
        .await
        .map_err(|_| {
            ClientError::Timeout(format!(
                "connect to '{}' exceeded {}s",
                config.name,
                CONNECT_TIMEOUT.as_secs()
            ))
        })?
}

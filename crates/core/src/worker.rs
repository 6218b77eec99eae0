// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative worker definitions and the per-instance state machine.

use crate::error::SwarmError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport a worker speaks the tool-call protocol over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Child process over standard streams.
    Local,
    /// Server-sent-event HTTP endpoint.
    StreamSse,
    /// Bidirectional streamable HTTP endpoint.
    StreamHttp,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Local => "local",
            Transport::StreamSse => "stream_sse",
            Transport::StreamHttp => "stream_http",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The declarative definition of one worker. Persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub name: String,
    pub transport: Transport,
    /// Launch command (LOCAL only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
    /// Endpoint URL (network transports only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stateful: bool,
}

impl WorkerConfig {
    /// Minimal LOCAL config; callers fill in the rest.
    pub fn local(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: Transport::Local,
            command: Some(command.into()),
            args: Vec::new(),
            env: IndexMap::new(),
            url: None,
            headers: IndexMap::new(),
            description: String::new(),
            stateful: false,
        }
    }

    /// Minimal network config for either HTTP transport.
    pub fn network(name: impl Into<String>, transport: Transport, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport,
            command: None,
            args: Vec::new(),
            env: IndexMap::new(),
            url: Some(url.into()),
            headers: IndexMap::new(),
            description: String::new(),
            stateful: false,
        }
    }

    /// Check the declaration is internally consistent.
    ///
    /// Name must match `[A-Za-z0-9_-]+`; LOCAL needs a command; the
    /// network transports need a url.
    pub fn validate(&self) -> Result<(), SwarmError> {
        if !is_valid_name(&self.name) {
            return Err(SwarmError::BadInput(format!(
                "worker name '{}' must match [A-Za-z0-9_-]+",
                self.name
            )));
        }
        match self.transport {
            Transport::Local => {
                if self.command.as_deref().unwrap_or("").is_empty() {
                    return Err(SwarmError::BadInput(format!(
                        "local worker '{}' requires a command",
                        self.name
                    )));
                }
            }
            Transport::StreamSse | Transport::StreamHttp => {
                if self.url.as_deref().unwrap_or("").is_empty() {
                    return Err(SwarmError::BadInput(format!(
                        "{} worker '{}' requires a url",
                        self.transport, self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Valid base-name characters: `[A-Za-z0-9_-]+`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Lifecycle state of one live worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Connecting,
    Connected,
    Error,
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Connecting => "connecting",
            WorkerState::Connected => "connected",
            WorkerState::Error => "error",
            WorkerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tool exposed by a worker, as reported over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: serde_json::Value,
}

fn empty_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object" })
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

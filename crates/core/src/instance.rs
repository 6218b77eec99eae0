// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Internal instance naming and read-only instance snapshots.
//!
//! The primary instance is indexed under its base name; pool-scaled copies
//! are `base#k` and session-owned copies are `base@<session-prefix>`.

use crate::worker::{ToolDescriptor, Transport, WorkerState};
use serde::{Deserialize, Serialize};

/// Parsed form of an internal instance name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceName {
    Primary { base: String },
    Scaled { base: String, index: u32 },
    Session { base: String, prefix: String },
}

impl InstanceName {
    /// Parse an internal name back into its kind.
    pub fn parse(internal: &str) -> Self {
        if let Some((base, idx)) = internal.split_once('#') {
            if let Ok(index) = idx.parse::<u32>() {
                return InstanceName::Scaled { base: base.to_string(), index };
            }
        }
        if let Some((base, prefix)) = internal.split_once('@') {
            return InstanceName::Session {
                base: base.to_string(),
                prefix: prefix.to_string(),
            };
        }
        InstanceName::Primary { base: internal.to_string() }
    }

    pub fn base(&self) -> &str {
        match self {
            InstanceName::Primary { base }
            | InstanceName::Scaled { base, .. }
            | InstanceName::Session { base, .. } => base,
        }
    }
}

/// Format the internal name of a pool-scaled instance.
pub fn scaled_name(base: &str, index: u32) -> String {
    format!("{base}#{index}")
}

/// Format the internal name of a session-owned instance.
pub fn session_name(base: &str, session_prefix: &str) -> String {
    format!("{base}@{session_prefix}")
}

/// Derived instances (`#` or `@` in the name) are never persisted.
pub fn is_derived(internal: &str) -> bool {
    internal.contains('#') || internal.contains('@')
}

/// Base name of any internal name.
pub fn base_of(internal: &str) -> &str {
    let end = internal
        .find(['#', '@'])
        .unwrap_or(internal.len());
    &internal[..end]
}

/// Point-in-time view of one live instance, safe to hand to API consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub internal_name: String,
    pub base_name: String,
    pub index: u32,
    pub transport: Transport,
    pub state: WorkerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
    #[serde(default)]
    pub cached_tools: Vec<ToolDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub reconnect_count: u32,
    #[serde(default)]
    pub stateful: bool,
    #[serde(default)]
    pub busy: bool,
    #[serde(default)]
    pub last_active_at: u64,
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller-visible error taxonomy.
//!
//! Every meta-tool failure maps onto one of these variants; the tool layer
//! renders them as plain-text error results with `is_error` set, so the
//! surrounding protocol request still succeeds.

use thiserror::Error;

/// Errors surfaced to supervisor callers and meta-tool clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwarmError {
    /// Field missing or malformed.
    #[error("bad input: {0}")]
    BadInput(String),

    /// No such worker / session / profile / tool.
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempt to overwrite a built-in profile.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Built-in profiles cannot be deleted.
    #[error("protected: {0}")]
    Protected(String),

    /// Transport could not connect; carries stderr tail when available.
    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    /// Target exists but is not in the connected state.
    #[error("worker '{0}' is not connected")]
    NotConnected(String),

    /// Worker exists but has no live instance.
    #[error("worker '{0}' is not running")]
    NotRunning(String),

    /// Worker already has a live instance.
    #[error("worker '{0}' is already running")]
    AlreadyRunning(String),

    /// Queue-TTL expiry, call timeout, or health-probe timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The peer reported a structured error in its response.
    #[error("worker error: {0}")]
    Worker(String),

    /// Shutdown in progress.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Any other unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SwarmError {
    /// Stable machine-readable code for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            SwarmError::BadInput(_) => "bad_input",
            SwarmError::NotFound(_) => "not_found",
            SwarmError::Conflict(_) => "conflict",
            SwarmError::Protected(_) => "protected",
            SwarmError::SpawnFailed(_) => "spawn_failed",
            SwarmError::NotConnected(_) => "not_connected",
            SwarmError::NotRunning(_) => "not_running",
            SwarmError::AlreadyRunning(_) => "already_running",
            SwarmError::Timeout(_) => "timeout",
            SwarmError::Worker(_) => "worker_error",
            SwarmError::Cancelled(_) => "cancelled",
            SwarmError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

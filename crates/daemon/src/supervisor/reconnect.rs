// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport-loss handling and exponential-backoff reconnect.

use super::Supervisor;
use std::time::Duration;
use swarm_client::ClientFactory;
use swarm_core::{instance as naming, Clock, WorkerState};
use tracing::{debug, info, warn};

/// First reconnect delay; doubles per attempt.
pub(crate) const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Attempts before a crashed instance is left in ERROR for good.
pub(crate) const RECONNECT_MAX_ATTEMPTS: u32 = 3;

/// Stderr substrings that mean a relaunch can never succeed.
pub(crate) const PERMANENT_FAILURE_MARKERS: [&str; 5] =
    ["e404", "not found", "enoent", "command not found", "not in this registry"];

/// Lines of stderr carried into `last_error` on permanent failure.
const ERROR_TAIL_LINES: usize = 5;

pub(crate) fn has_permanent_marker(stderr_tail: &[String]) -> bool {
    stderr_tail.iter().any(|line| {
        let lower = line.to_ascii_lowercase();
        PERMANENT_FAILURE_MARKERS.iter().any(|marker| lower.contains(marker))
    })
}

impl<F: ClientFactory, C: Clock> Supervisor<F, C> {
    /// React to a transport becoming unusable.
    pub(crate) async fn handle_closed(&self, internal_name: &str) {
        let base = naming::base_of(internal_name).to_string();
        let lock = self.base_lock(&base);
        let _guard = lock.lock().await;

        // Stale notifications for instances already stopped are dropped.
        let Some(cell) = self.cell(internal_name) else {
            return;
        };
        if cell.state() == WorkerState::Stopped {
            return;
        }

        // Grab the stderr tail before the client handle is dropped.
        let stderr_tail = cell.client().map(|c| c.stderr_tail()).unwrap_or_default();
        self.inner.queue.unregister_instance(&base, internal_name);

        if has_permanent_marker(&stderr_tail) {
            let skip = stderr_tail.len().saturating_sub(ERROR_TAIL_LINES);
            let tail: Vec<&str> = stderr_tail[skip..].iter().map(String::as_str).collect();
            cell.set_error(tail.join("\n"));
            self.emit_state(internal_name, WorkerState::Error, Some("permanent_failure".into()));
            warn!(worker = %internal_name, "permanent failure; reconnect suppressed");
            return;
        }

        cell.set_error("transport closed");
        self.emit_state(internal_name, WorkerState::Error, Some("transport_closed".into()));

        // Session-owned instances live and die with their session.
        if internal_name.contains('@') {
            debug!(worker = %internal_name, "session instance lost; not reconnecting");
            return;
        }
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        if cell.reconnect_count() >= RECONNECT_MAX_ATTEMPTS {
            warn!(worker = %internal_name, "reconnect attempts exhausted");
            return;
        }
        self.schedule_reconnect(internal_name, cell.reconnect_count());
    }

    /// Arm one backoff timer: delay = base × 2^attempt.
    pub(crate) fn schedule_reconnect(&self, internal_name: &str, attempt: u32) {
        let delay = RECONNECT_BASE_DELAY * 2u32.saturating_pow(attempt);
        info!(worker = %internal_name, attempt, delay_s = delay.as_secs(), "scheduling reconnect");

        self.cancel_reconnect(internal_name);
        let supervisor = self.clone();
        let name = internal_name.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            supervisor.attempt_reconnect(&name).await;
        });
        self.inner.reconnects.lock().insert(internal_name.to_string(), handle);
    }

    pub(crate) async fn attempt_reconnect(&self, internal_name: &str) {
        let base = naming::base_of(internal_name).to_string();
        let lock = self.base_lock(&base);
        let _guard = lock.lock().await;
        self.inner.reconnects.lock().remove(internal_name);

        let Some(cell) = self.cell(internal_name) else {
            return;
        };
        if cell.state() != WorkerState::Error || self.inner.shutdown.is_cancelled() {
            return;
        }

        let attempt = cell.bump_reconnect_count();
        info!(worker = %internal_name, attempt, "reconnecting");
        cell.set_state(WorkerState::Connecting);
        self.emit_state(internal_name, WorkerState::Connecting, Some("reconnect".into()));

        let register = !internal_name.contains('@');
        self.connect_cell(&cell, register).await;

        match cell.state() {
            WorkerState::Connected => {
                // A clean reconnect starts the backoff over.
                cell.set_reconnect_count(0);
            }
            _ if cell.reconnect_count() < RECONNECT_MAX_ATTEMPTS => {
                // Carry the count forward so backoff continues where it
                // left off.
                self.schedule_reconnect(internal_name, cell.reconnect_count());
            }
            _ => {
                warn!(worker = %internal_name, "reconnect exhausted; staying in error");
            }
        }
    }

    pub(crate) fn cancel_reconnect(&self, internal_name: &str) {
        if let Some(handle) = self.inner.reconnects.lock().remove(internal_name) {
            handle.abort();
        }
    }

    pub(crate) fn cancel_all_reconnects(&self) {
        for (_, handle) in self.inner.reconnects.lock().drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "reconnect_tests.rs"]
mod tests;

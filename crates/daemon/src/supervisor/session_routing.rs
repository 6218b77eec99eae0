// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-scoped instance routing for stateful workers.
//!
//! A stateful base called with a session id gets a dedicated instance
//! named `base@<session-prefix>`, spawned lazily under the per-(session,
//! base) mutex and bypassing the pool queue entirely. Browser-automation
//! variants get their launch arguments adjusted so concurrent sessions
//! cannot share profile state.

use super::{InstanceCell, Supervisor};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use swarm_client::ClientFactory;
use swarm_core::{instance as naming, BusEvent, Clock, SessionId, SwarmError, WorkerConfig, WorkerState};
use swarm_wire::CallToolResult;
use tracing::{info, warn};

/// How a browser-automation variant isolates per-session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BrowserVariant {
    /// Supports an `--isolated` sentinel flag.
    IsolatedCapable,
    /// Needs a dedicated `--user-data-dir` on disk.
    NeedsProfileDir,
}

/// Coarse launch-argument heuristic; see the session-launch notes in
/// the module docs.
pub(crate) fn browser_variant(config: &WorkerConfig) -> Option<BrowserVariant> {
    let mut haystack = config.command.clone().unwrap_or_default();
    for arg in &config.args {
        haystack.push(' ');
        haystack.push_str(arg);
    }
    let haystack = haystack.to_ascii_lowercase();
    if haystack.contains("playwright") {
        Some(BrowserVariant::IsolatedCapable)
    } else if haystack.contains("puppeteer") {
        Some(BrowserVariant::NeedsProfileDir)
    } else {
        None
    }
}

impl<F: ClientFactory, C: Clock> Supervisor<F, C> {
    /// Route a call from `session` onto its dedicated instance of `base`,
    /// spawning one first when needed.
    pub(crate) async fn call_session_instance(
        &self,
        session: &SessionId,
        base: &str,
        tool: &str,
        args: Value,
    ) -> Result<CallToolResult, SwarmError> {
        // Fast path: the mapping points at a live instance.
        if let Some(cell) = self.session_cell(session, base) {
            return self.traced_call(&cell, tool, args).await;
        }

        let lock = self.session_lock(session, base);
        let _guard = lock.lock().await;

        let cell = match self.session_cell(session, base) {
            Some(cell) => cell,
            None => self.spawn_session_instance(session, base).await?,
        };
        self.traced_call(&cell, tool, args).await
    }

    /// Direct call (no queue) with bus tracing.
    async fn traced_call(
        &self,
        cell: &Arc<InstanceCell>,
        tool: &str,
        args: Value,
    ) -> Result<CallToolResult, SwarmError> {
        self.emit(BusEvent::ToolCall {
            worker: cell.internal_name.clone(),
            tool: tool.to_string(),
        });
        let started = self.now_ms();
        let result = self.call_on_cell(cell, tool, args).await;
        self.emit(BusEvent::ToolResult {
            worker: cell.internal_name.clone(),
            tool: tool.to_string(),
            ok: result.is_ok(),
            duration_ms: self.now_ms().saturating_sub(started),
        });
        result
    }

    /// The live instance mapped for `(session, base)`, if any.
    fn session_cell(&self, session: &SessionId, base: &str) -> Option<Arc<InstanceCell>> {
        let internal_name = {
            let sessions = self.inner.sessions.lock();
            sessions.get(session)?.instances.get(base)?.clone()
        };
        self.cell(&internal_name)
    }

    /// Spawn a dedicated stateful instance for `(session, base)`.
    ///
    /// Caller holds the per-(session, base) lock.
    async fn spawn_session_instance(
        &self,
        session: &SessionId,
        base: &str,
    ) -> Result<Arc<InstanceCell>, SwarmError> {
        let primary = self
            .cell(base)
            .ok_or_else(|| SwarmError::NotFound(format!("worker '{base}'")))?;

        let internal_name = naming::session_name(base, session.prefix());
        let mut config = primary.config();
        config.name = internal_name.clone();

        match browser_variant(&config) {
            Some(BrowserVariant::IsolatedCapable) => {
                if !config.args.iter().any(|a| a == "--isolated") {
                    config.args.push("--isolated".to_string());
                }
            }
            Some(BrowserVariant::NeedsProfileDir) => {
                let dir = self.allocate_profile_dir(session, base).await?;
                config.args.push(format!("--user-data-dir={}", dir.display()));
            }
            None => {}
        }

        let base_lock = self.base_lock(base);
        let _base_guard = base_lock.lock().await;
        let index = self.alloc_index(base);
        info!(session = %session.prefix(), instance = %internal_name, "spawning session instance");
        let snapshot = self.spawn_instance(&internal_name, base, index, config, false).await;

        if snapshot.state != WorkerState::Connected {
            let detail = snapshot.last_error.unwrap_or_else(|| "connect failed".into());
            // Leave no errored derived instance behind; the next call
            // retries from scratch.
            if let Some(cell) = self.cell(&internal_name) {
                self.inner.instances.lock().remove(&cell.internal_name);
                self.emit(BusEvent::WorkerRemoved { name: cell.internal_name.clone() });
            }
            return Err(SwarmError::SpawnFailed(detail));
        }

        let cell = self
            .cell(&internal_name)
            .ok_or_else(|| SwarmError::Internal("instance vanished after spawn".into()))?;
        self.inner
            .sessions
            .lock()
            .entry(session.clone())
            .or_default()
            .instances
            .insert(base.to_string(), internal_name);
        Ok(cell)
    }

    /// Fresh empty profile directory, recorded for session teardown.
    async fn allocate_profile_dir(
        &self,
        session: &SessionId,
        base: &str,
    ) -> Result<PathBuf, SwarmError> {
        let dir = std::env::temp_dir().join(format!("swarm-profile-{base}-{}", session.prefix()));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SwarmError::Internal(format!("profile dir: {e}")))?;
        self.inner
            .sessions
            .lock()
            .entry(session.clone())
            .or_default()
            .temp_dirs
            .push(dir.clone());
        Ok(dir)
    }

    /// Stop and remove every instance owned by `session`; remove its
    /// temp directories.
    pub async fn release_session(&self, session: &SessionId) {
        let owned = self.inner.sessions.lock().remove(session);
        let Some(owned) = owned else {
            return;
        };
        for internal_name in owned.instances.values() {
            info!(session = %session.prefix(), instance = %internal_name, "releasing session instance");
            self.stop_instance(internal_name).await;
        }
        for dir in owned.temp_dirs {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                warn!(dir = %dir.display(), "profile dir cleanup failed: {e}");
            }
        }
        self.inner
            .session_locks
            .lock()
            .retain(|(sid, _), _| sid != session.as_str());
    }
}

#[cfg(test)]
#[path = "session_routing_tests.rs"]
mod tests;

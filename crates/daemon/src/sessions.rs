// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-client session layer.
//!
//! One session per connected client, minted at initialize time and
//! carried in the protocol's session header. Sessions idle out on a GC
//! sweep; teardown releases any stateful instances the session owns.

use crate::supervisor::Supervisor;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use swarm_client::ClientFactory;
use swarm_core::{BusEvent, Clock, SessionId, SwarmError};
use swarm_wire::JsonRpcMessage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Buffered server-push messages per session stream.
const PUSH_BUFFER: usize = 32;

/// One client's attachment to the control surface.
pub struct SessionHandle {
    pub id: SessionId,
    pub created_at_epoch_ms: u64,
    last_active_ms: AtomicU64,
    push_tx: mpsc::Sender<JsonRpcMessage>,
    push_rx: Mutex<Option<mpsc::Receiver<JsonRpcMessage>>>,
}

impl SessionHandle {
    fn new(id: SessionId, created_at_epoch_ms: u64, now_ms: u64) -> Arc<Self> {
        let (push_tx, push_rx) = mpsc::channel(PUSH_BUFFER);
        Arc::new(Self {
            id,
            created_at_epoch_ms,
            last_active_ms: AtomicU64::new(now_ms),
            push_tx,
            push_rx: Mutex::new(Some(push_rx)),
        })
    }

    pub fn last_active_ms(&self) -> u64 {
        self.last_active_ms.load(Ordering::Relaxed)
    }

    pub fn touch(&self, now_ms: u64) {
        self.last_active_ms.store(now_ms, Ordering::Relaxed);
    }

    /// Queue a server-initiated message for the session's push stream.
    /// Best effort; a full buffer drops the message.
    pub fn push(&self, message: JsonRpcMessage) {
        let _ = self.push_tx.try_send(message);
    }

    /// Take the push stream receiver; one consumer at a time.
    pub fn take_push_stream(&self) -> Option<mpsc::Receiver<JsonRpcMessage>> {
        self.push_rx.lock().take()
    }
}

/// Session metadata for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct SessionMeta {
    pub id: String,
    pub created_at_epoch_ms: u64,
    pub idle_ms: u64,
}

/// The session index, bound to the shared supervisor.
pub struct SessionRegistry<F: ClientFactory, C: Clock> {
    supervisor: Supervisor<F, C>,
    sessions: Mutex<HashMap<SessionId, Arc<SessionHandle>>>,
}

impl<F: ClientFactory, C: Clock> SessionRegistry<F, C> {
    pub fn new(supervisor: Supervisor<F, C>) -> Arc<Self> {
        Arc::new(Self { supervisor, sessions: Mutex::new(HashMap::new()) })
    }

    pub fn supervisor(&self) -> &Supervisor<F, C> {
        &self.supervisor
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Mint a fresh session, enforcing the session cap.
    pub fn open(&self) -> Result<Arc<SessionHandle>, SwarmError> {
        let max = self.supervisor.config().max_sessions;
        let handle = {
            let mut sessions = self.sessions.lock();
            if sessions.len() >= max {
                return Err(SwarmError::Cancelled(format!("session limit {max} reached")));
            }
            let id = SessionId::new();
            let handle = SessionHandle::new(
                id.clone(),
                self.supervisor.epoch_ms(),
                self.supervisor.now_ms(),
            );
            sessions.insert(id, Arc::clone(&handle));
            handle
        };
        info!(session = %handle.id.prefix(), "session opened");
        self.supervisor.bus().emit(
            BusEvent::SessionOpened { id: handle.id.clone() },
            self.supervisor.now_ms(),
        );
        Ok(handle)
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        let handle = self.sessions.lock().get(id).cloned();
        if let Some(handle) = &handle {
            handle.touch(self.supervisor.now_ms());
        }
        handle
    }

    pub fn meta(&self) -> Vec<SessionMeta> {
        let now = self.supervisor.now_ms();
        let mut meta: Vec<SessionMeta> = self
            .sessions
            .lock()
            .values()
            .map(|handle| SessionMeta {
                id: handle.id.as_str().to_string(),
                created_at_epoch_ms: handle.created_at_epoch_ms,
                idle_ms: now.saturating_sub(handle.last_active_ms()),
            })
            .collect();
        meta.sort_by(|a, b| a.id.cmp(&b.id));
        meta
    }

    /// Tear one session down. True if it existed.
    ///
    /// Closes the push stream, releases the session's stateful
    /// instances, and announces the closure on the bus.
    pub async fn close(&self, id: &SessionId) -> bool {
        let Some(handle) = self.sessions.lock().remove(id) else {
            return false;
        };
        drop(handle);
        self.supervisor.release_session(id).await;
        self.supervisor
            .bus()
            .emit(BusEvent::SessionClosed { id: id.clone() }, self.supervisor.now_ms());
        info!(session = %id.prefix(), "session closed");
        true
    }

    /// Tear down every session idle past the configured timeout.
    pub async fn sweep_idle(&self) {
        let now = self.supervisor.now_ms();
        let timeout_ms = self.supervisor.config().session_idle_timeout.as_millis() as u64;
        let stale: Vec<SessionId> = self
            .sessions
            .lock()
            .values()
            .filter(|handle| now.saturating_sub(handle.last_active_ms()) >= timeout_ms)
            .map(|handle| handle.id.clone())
            .collect();
        for id in stale {
            debug!(session = %id.prefix(), "session idled out");
            self.close(&id).await;
        }
    }

    /// Periodic idle GC; stops when `shutdown` fires.
    pub fn spawn_gc(self: &Arc<Self>, shutdown: CancellationToken) {
        let registry = Arc::clone(self);
        let interval = registry.supervisor.config().session_cleanup_interval;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => registry.sweep_idle().await,
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;

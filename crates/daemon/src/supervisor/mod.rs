// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor: per-worker lifecycle, pooling, and session routing.
//!
//! Owns the live instance index, a spawn mutex per base name, a spawn
//! mutex per `(session, base)` pair, and the reconnect timer set. Two
//! periodic loops run alongside: the idle reaper and the health
//! watchdog. The admission queue calls back in through `execute` and
//! `on_scale_up`; it never sees the supervisor itself.

mod health;
mod instance;
mod reconnect;
mod scale;
mod session_routing;

pub use instance::InstanceCell;

use crate::event_bus::EventBus;
use crate::queue::{AdmissionQueue, ExecuteFn, ScaleUpFn};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use swarm_client::{ClientError, ClientEvent, ClientFactory, TransportFactory};
use swarm_core::{
    instance as naming, BusEvent, Clock, InstanceSnapshot, SessionId, SwarmConfig, SwarmError,
    SystemClock, WorkerConfig, WorkerState,
};
use swarm_storage::Store;
use swarm_wire::CallToolResult;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Instances a single session owns, plus disk state to reap with them.
#[derive(Default)]
pub(crate) struct SessionOwned {
    /// base name -> internal name of the dedicated instance.
    pub instances: HashMap<String, String>,
    /// Temp directories allocated for per-instance profile state.
    pub temp_dirs: Vec<PathBuf>,
}

pub(crate) struct SupervisorInner<F: ClientFactory, C: Clock> {
    pub(crate) factory: F,
    pub(crate) clock: C,
    pub(crate) config: SwarmConfig,
    pub(crate) store: Arc<Store>,
    pub(crate) bus: EventBus,
    pub(crate) queue: AdmissionQueue<C>,
    pub(crate) instances: Mutex<HashMap<String, Arc<InstanceCell>>>,
    base_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    session_locks: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
    pub(crate) sessions: Mutex<HashMap<SessionId, SessionOwned>>,
    pub(crate) reconnects: Mutex<HashMap<String, tokio::task::JoinHandle<()>>>,
    pub(crate) shutdown: CancellationToken,
}

/// Handle to the singleton supervisor. Cheap to clone.
pub struct Supervisor<F: ClientFactory, C: Clock> {
    pub(crate) inner: Arc<SupervisorInner<F, C>>,
}

impl<F: ClientFactory, C: Clock> Clone for Supervisor<F, C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

/// Production supervisor: real transports, real clock.
pub type DaemonSupervisor = Supervisor<TransportFactory, SystemClock>;

impl<F: ClientFactory, C: Clock> Supervisor<F, C> {
    pub fn new(factory: F, clock: C, config: SwarmConfig, store: Arc<Store>, bus: EventBus) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<SupervisorInner<F, C>>| {
            let execute: ExecuteFn = {
                let weak = weak.clone();
                Arc::new(move |internal_name, tool, args| {
                    let weak = weak.clone();
                    Box::pin(async move {
                        match weak.upgrade() {
                            Some(inner) => {
                                Supervisor { inner }.execute_on(&internal_name, &tool, args).await
                            }
                            None => Err(SwarmError::Cancelled("supervisor gone".into())),
                        }
                    })
                })
            };
            let on_scale_up: ScaleUpFn = {
                let weak = weak.clone();
                Arc::new(move |base| {
                    if let Some(inner) = weak.upgrade() {
                        let supervisor = Supervisor { inner };
                        tokio::spawn(async move {
                            supervisor.scale_up(&base).await;
                        });
                    }
                })
            };
            let queue = AdmissionQueue::new(
                clock.clone(),
                config.queue_ttl,
                config.scale_up_wait,
                execute,
                on_scale_up,
            );
            SupervisorInner {
                factory,
                clock,
                config,
                store,
                bus,
                queue,
                instances: Mutex::new(HashMap::new()),
                base_locks: Mutex::new(HashMap::new()),
                session_locks: Mutex::new(HashMap::new()),
                sessions: Mutex::new(HashMap::new()),
                reconnects: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }
        });
        Self { inner }
    }

    /// Start the queue tick, idle reaper, and health watchdog.
    pub fn start_background_tasks(&self) {
        self.inner.queue.spawn_tick(self.inner.shutdown.clone());
        self.spawn_idle_reaper();
        self.spawn_health_watchdog();
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.inner.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.inner.store
    }

    pub fn queue(&self) -> &AdmissionQueue<C> {
        &self.inner.queue
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.inner.clock.monotonic_ms()
    }

    pub(crate) fn epoch_ms(&self) -> u64 {
        self.inner.clock.epoch_ms()
    }

    // -- locks --

    pub(crate) fn base_lock(&self, base: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.base_locks.lock();
        Arc::clone(locks.entry(base.to_string()).or_default())
    }

    pub(crate) fn session_lock(
        &self,
        session: &SessionId,
        base: &str,
    ) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.session_locks.lock();
        Arc::clone(
            locks
                .entry((session.as_str().to_string(), base.to_string()))
                .or_default(),
        )
    }

    // -- events --

    pub(crate) fn emit(&self, event: BusEvent) {
        self.inner.bus.emit(event, self.now_ms());
    }

    pub(crate) fn emit_state(&self, name: &str, state: WorkerState, reason: Option<String>) {
        self.emit(BusEvent::WorkerState {
            name: name.to_string(),
            status: state.as_str().to_string(),
            reason,
        });
    }

    // -- read-only views --

    pub(crate) fn cell(&self, internal_name: &str) -> Option<Arc<InstanceCell>> {
        self.inner.instances.lock().get(internal_name).cloned()
    }

    pub(crate) fn cells_for_base(&self, base: &str) -> Vec<Arc<InstanceCell>> {
        let mut cells: Vec<_> = self
            .inner
            .instances
            .lock()
            .values()
            .filter(|c| c.base_name == base)
            .cloned()
            .collect();
        cells.sort_by_key(|c| c.index);
        cells
    }

    /// All live instances, sorted by internal name.
    pub fn list(&self) -> Vec<InstanceSnapshot> {
        let mut snapshots: Vec<_> =
            self.inner.instances.lock().values().map(|c| c.snapshot()).collect();
        snapshots.sort_by(|a, b| a.internal_name.cmp(&b.internal_name));
        snapshots
    }

    pub fn get(&self, internal_name: &str) -> Option<InstanceSnapshot> {
        self.cell(internal_name).map(|c| c.snapshot())
    }

    /// Alias for `list`; a full point-in-time view.
    pub fn snapshot(&self) -> Vec<InstanceSnapshot> {
        self.list()
    }

    /// Smallest unused positive index in the pool for `base`.
    pub(crate) fn alloc_index(&self, base: &str) -> u32 {
        let used: Vec<u32> = self
            .inner
            .instances
            .lock()
            .values()
            .filter(|c| c.base_name == base)
            .map(|c| c.index)
            .collect();
        let mut k = 1;
        while used.contains(&k) {
            k += 1;
        }
        k
    }

    // -- lifecycle operations --

    /// Create-or-replace the primary instance for `config.name`.
    ///
    /// Returns the resulting snapshot, which may be in ERROR; persistence
    /// decisions belong to the caller.
    pub async fn declare(&self, config: WorkerConfig) -> Result<InstanceSnapshot, SwarmError> {
        config.validate()?;
        if naming::is_derived(&config.name) {
            return Err(SwarmError::BadInput(format!(
                "'{}' is a derived instance name",
                config.name
            )));
        }
        let base = config.name.clone();
        let lock = self.base_lock(&base);
        let _guard = lock.lock().await;

        if self.cell(&base).is_some() {
            self.stop_base_locked(&base).await;
        }
        Ok(self.spawn_instance(&base, &base, 0, config, true).await)
    }

    /// Spawn one instance under an already-held base (or session) lock.
    ///
    /// `register` controls admission-queue membership; session-owned
    /// instances stay out of the pool rotation.
    pub(crate) async fn spawn_instance(
        &self,
        internal_name: &str,
        base: &str,
        index: u32,
        config: WorkerConfig,
        register: bool,
    ) -> InstanceSnapshot {
        let cell = InstanceCell::new(
            internal_name.to_string(),
            base.to_string(),
            index,
            config.clone(),
            self.now_ms(),
        );
        self.inner.instances.lock().insert(internal_name.to_string(), Arc::clone(&cell));
        self.emit(BusEvent::WorkerAdded { name: internal_name.to_string() });
        self.emit_state(internal_name, WorkerState::Connecting, None);

        self.connect_cell(&cell, register).await;
        cell.snapshot()
    }

    /// Drive a CONNECTING (or reconnecting) cell through transport
    /// establishment and the eager tool listing.
    pub(crate) async fn connect_cell(&self, cell: &Arc<InstanceCell>, register: bool) {
        let config = cell.config();
        let (event_tx, event_rx) = mpsc::channel::<ClientEvent>(8);

        match self.inner.factory.connect(&config, event_tx).await {
            Ok(client) => {
                let pid = client.process_id();
                cell.set_connected(Arc::clone(&client), pid);
                cell.touch(self.now_ms());

                // Cache the tool list eagerly; a failure here is a warning,
                // not an error.
                match client.list_tools().await {
                    Ok(tools) => cell.set_tools(tools),
                    Err(e) => {
                        warn!(worker = %cell.internal_name, "initial tools listing failed: {e}")
                    }
                }

                if let Some(pid) = pid {
                    if let Err(e) = self.inner.store.save_process_id(&cell.internal_name, pid) {
                        warn!(worker = %cell.internal_name, "pid persist failed: {e}");
                    }
                }

                self.spawn_event_router(cell.internal_name.clone(), event_rx);
                self.emit_state(&cell.internal_name, WorkerState::Connected, None);
                if register {
                    self.inner.queue.register_instance(&cell.base_name, &cell.internal_name);
                }
                info!(worker = %cell.internal_name, transport = %config.transport, "worker connected");
            }
            Err(e) => {
                cell.set_error(e.to_string());
                self.emit_state(&cell.internal_name, WorkerState::Error, Some(e.to_string()));
                warn!(worker = %cell.internal_name, "connect failed: {e}");
            }
        }
    }

    /// Forward adapter notifications into supervisor state.
    fn spawn_event_router(&self, internal_name: String, mut rx: mpsc::Receiver<ClientEvent>) {
        let supervisor = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    ClientEvent::ToolsChanged(tools) => {
                        if let Some(cell) = supervisor.cell(&internal_name) {
                            debug!(worker = %internal_name, count = tools.len(), "tool cache updated");
                            cell.set_tools(tools);
                        }
                    }
                    ClientEvent::Closed => {
                        supervisor.handle_closed(&internal_name).await;
                        break;
                    }
                }
            }
        });
    }

    /// Idempotent stop of a base and every instance in its pool.
    pub async fn stop(&self, name: &str) -> Result<(), SwarmError> {
        let lock = self.base_lock(name);
        let _guard = lock.lock().await;
        self.stop_base_locked(name).await;
        Ok(())
    }

    pub(crate) async fn stop_base_locked(&self, base: &str) {
        self.inner.queue.drain(base);
        let cells = self.cells_for_base(base);
        for cell in cells {
            self.shutdown_cell(&cell).await;
        }
    }

    /// Stop one instance by internal name (reaper and session teardown).
    pub(crate) async fn stop_instance(&self, internal_name: &str) {
        let base = naming::base_of(internal_name).to_string();
        let lock = self.base_lock(&base);
        let _guard = lock.lock().await;
        if let Some(cell) = self.cell(internal_name) {
            self.inner.queue.unregister_instance(&base, internal_name);
            self.shutdown_cell(&cell).await;
        }
    }

    /// Close, unindex, and announce one instance. Lock must be held.
    async fn shutdown_cell(&self, cell: &Arc<InstanceCell>) {
        self.cancel_reconnect(&cell.internal_name);

        let client = cell.client();
        cell.set_state(WorkerState::Stopped);
        if let Some(client) = client {
            // The client bounds close internally (5 s for the protocol
            // side, 5 s for the transport).
            client.close().await;
        }

        if let Err(e) = self.inner.store.remove_process_id(&cell.internal_name) {
            debug!(worker = %cell.internal_name, "pid cleanup failed: {e}");
        }
        self.inner.instances.lock().remove(&cell.internal_name);

        self.emit_state(&cell.internal_name, WorkerState::Stopped, None);
        self.emit(BusEvent::WorkerRemoved { name: cell.internal_name.clone() });
        info!(worker = %cell.internal_name, "worker stopped");
    }

    /// Stop everything and pause the periodic loops.
    pub async fn stop_all(&self) {
        self.inner.shutdown.cancel();
        self.cancel_all_reconnects();
        let bases: Vec<String> = {
            let instances = self.inner.instances.lock();
            let mut bases: Vec<String> =
                instances.values().map(|c| c.base_name.clone()).collect();
            bases.sort();
            bases.dedup();
            bases
        };
        for base in bases {
            if let Err(e) = self.stop(&base).await {
                warn!(base = %base, "stop failed during shutdown: {e}");
            }
        }
    }

    /// Stop then re-declare from the same config.
    pub async fn restart(&self, name: &str) -> Result<InstanceSnapshot, SwarmError> {
        let config = match self.cell(name) {
            Some(cell) => cell.config(),
            None => self
                .inner
                .store
                .load_worker(name)
                .map_err(|e| SwarmError::Internal(e.to_string()))?
                .ok_or_else(|| SwarmError::NotFound(format!("worker '{name}'")))?,
        };
        self.stop(name).await?;
        self.declare(config).await
    }

    // -- calls --

    /// Direct, unqueued call on a base's primary instance.
    pub async fn call(
        &self,
        base: &str,
        tool: &str,
        args: Value,
    ) -> Result<CallToolResult, SwarmError> {
        let cell = self
            .cell(base)
            .ok_or_else(|| SwarmError::NotFound(format!("worker '{base}'")))?;
        self.call_on_cell(&cell, tool, args).await
    }

    /// The concurrency-aware entry point.
    ///
    /// Stateful bases called with a session route to a dedicated
    /// session-owned instance; everything else goes through the
    /// admission queue.
    pub async fn call_queued(
        &self,
        base: &str,
        tool: &str,
        args: Value,
        session: Option<&SessionId>,
    ) -> Result<CallToolResult, SwarmError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SwarmError::Cancelled("shutdown in progress".into()));
        }
        let primary = self
            .cell(base)
            .ok_or_else(|| SwarmError::NotFound(format!("worker '{base}'")))?;

        if let Some(session) = session {
            if primary.is_stateful() {
                return self.call_session_instance(session, base, tool, args).await;
            }
        }

        self.emit(BusEvent::ToolCall { worker: base.to_string(), tool: tool.to_string() });
        let started = self.now_ms();
        let rx = self.inner.queue.submit(base, tool, args);
        let result = rx
            .await
            .unwrap_or_else(|_| Err(SwarmError::Internal("queue dropped the call".into())));
        self.emit(BusEvent::ToolResult {
            worker: base.to_string(),
            tool: tool.to_string(),
            ok: result.is_ok(),
            duration_ms: self.now_ms().saturating_sub(started),
        });
        result
    }

    /// Queue callback: run one dispatched call on a named instance.
    pub(crate) async fn execute_on(
        &self,
        internal_name: &str,
        tool: &str,
        args: Value,
    ) -> Result<CallToolResult, SwarmError> {
        let cell = self
            .cell(internal_name)
            .ok_or_else(|| SwarmError::NotFound(format!("instance '{internal_name}'")))?;
        self.call_on_cell(&cell, tool, args).await
    }

    /// Shared call path: busy gate, timeout, activity bookkeeping.
    pub(crate) async fn call_on_cell(
        &self,
        cell: &Arc<InstanceCell>,
        tool: &str,
        args: Value,
    ) -> Result<CallToolResult, SwarmError> {
        if cell.state() != WorkerState::Connected {
            return Err(SwarmError::NotConnected(cell.internal_name.clone()));
        }
        let client = cell
            .client()
            .ok_or_else(|| SwarmError::NotConnected(cell.internal_name.clone()))?;

        let _call = cell.call_gate.lock().await;
        cell.set_busy(true);
        let result = client.call_tool(tool, args, self.inner.config.call_timeout).await;
        cell.set_busy(false);
        cell.touch(self.now_ms());

        result.map_err(map_client_error)
    }
}

/// Transport-layer failures surface to callers as worker errors;
/// timeouts stay timeouts and never poison the instance.
pub(crate) fn map_client_error(error: ClientError) -> SwarmError {
    match error {
        ClientError::Timeout(msg) => SwarmError::Timeout(msg),
        ClientError::Cancelled => SwarmError::Cancelled("call cancelled".into()),
        ClientError::Worker(msg) => SwarmError::Worker(msg),
        ClientError::Unreachable(msg) | ClientError::Protocol(msg) => SwarmError::Worker(msg),
        ClientError::Closed => SwarmError::Worker("transport closed".into()),
    }
}

#[cfg(test)]
pub(crate) mod test_helpers;

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

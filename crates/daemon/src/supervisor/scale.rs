// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool scale-up and the idle reaper.

use super::Supervisor;
use std::time::Duration;
use swarm_client::ClientFactory;
use swarm_core::{instance as naming, BusEvent, Clock, Transport, WorkerState};
use tracing::{debug, info, warn};

/// Idle reaper cadence.
const REAPER_INTERVAL: Duration = Duration::from_secs(10);

impl<F: ClientFactory, C: Clock> Supervisor<F, C> {
    /// Handle one scale-up signal from the admission queue.
    ///
    /// The pending flag is cleared whether the attempt succeeds or not;
    /// the queue may signal again on a later tick.
    pub(crate) async fn scale_up(&self, base: &str) {
        self.try_scale_up(base).await;
        self.inner.queue.clear_scale_pending(base);
    }

    async fn try_scale_up(&self, base: &str) {
        let lock = self.base_lock(base);
        let _guard = lock.lock().await;

        let Some(primary) = self.cell(base) else {
            debug!(base = %base, "scale-up for unknown base ignored");
            return;
        };
        let config = primary.config();
        if config.transport != Transport::Local {
            debug!(base = %base, "refusing to scale a network worker");
            return;
        }
        if config.stateful {
            debug!(base = %base, "refusing to scale a stateful worker");
            return;
        }
        let pool_size = self.cells_for_base(base).len();
        if pool_size >= self.inner.config.max_pool {
            debug!(base = %base, pool_size, "pool at max size");
            return;
        }

        let index = self.alloc_index(base);
        let internal_name = naming::scaled_name(base, index);
        let mut clone = config.clone();
        clone.name = internal_name.clone();

        info!(base = %base, instance = %internal_name, "scaling pool up");
        let snapshot = self.spawn_instance(&internal_name, base, index, clone, true).await;

        if snapshot.state == WorkerState::Connected {
            self.emit(BusEvent::PoolScaled { base: base.to_string(), size: pool_size + 1 });
            // Registration already triggered a dispatch attempt; one more
            // pass catches work enqueued while we were connecting.
            self.inner.queue.dispatch(base);
        } else {
            warn!(instance = %internal_name, "scaled instance failed to connect");
            if let Some(cell) = self.cell(&internal_name) {
                self.shutdown_cell_for_scale(&cell).await;
            }
        }
    }

    /// Failed scale-ups leave no residue in the index.
    async fn shutdown_cell_for_scale(&self, cell: &std::sync::Arc<super::InstanceCell>) {
        self.inner.queue.unregister_instance(&cell.base_name, &cell.internal_name);
        self.inner.instances.lock().remove(&cell.internal_name);
        self.emit(BusEvent::WorkerRemoved { name: cell.internal_name.clone() });
    }

    /// Every 10 s, stop derived pool instances that have sat idle.
    pub(crate) fn spawn_idle_reaper(&self) {
        let supervisor = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(REAPER_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = supervisor.inner.shutdown.cancelled() => break,
                    _ = tick.tick() => supervisor.reap_idle().await,
                }
            }
        });
    }

    /// One reaper pass. Primaries and session-owned instances are never
    /// touched.
    pub(crate) async fn reap_idle(&self) {
        let now = self.now_ms();
        let idle_ms = self.inner.config.idle_kill.as_millis() as u64;
        let victims: Vec<String> = self
            .inner
            .instances
            .lock()
            .values()
            .filter(|cell| {
                cell.index != 0
                    && !cell.internal_name.contains('@')
                    && !cell.is_busy()
                    && now.saturating_sub(cell.last_active_at()) >= idle_ms
            })
            .map(|cell| cell.internal_name.clone())
            .collect();

        for name in victims {
            info!(instance = %name, "reaping idle pool instance");
            self.stop_instance(&name).await;
        }
    }
}

#[cfg(test)]
#[path = "scale_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic health probes for primary instances.

use super::Supervisor;
use swarm_client::ClientFactory;
use swarm_core::{BusEvent, Clock, WorkerState};
use tracing::{debug, warn};

impl<F: ClientFactory, C: Clock> Supervisor<F, C> {
    /// Probe every CONNECTED primary on a fixed interval; a zero interval
    /// disables the watchdog.
    pub(crate) fn spawn_health_watchdog(&self) {
        let interval = self.inner.config.health_interval;
        if interval.is_zero() {
            debug!("health watchdog disabled");
            return;
        }
        let supervisor = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The immediate first tick would probe workers still starting.
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = supervisor.inner.shutdown.cancelled() => break,
                    _ = tick.tick() => supervisor.probe_all().await,
                }
            }
        });
    }

    /// One watchdog pass. Each worker is probed on its own task so a
    /// wedged transport cannot delay the others.
    pub(crate) async fn probe_all(&self) {
        let primaries: Vec<String> = self
            .inner
            .instances
            .lock()
            .values()
            .filter(|cell| {
                cell.internal_name == cell.base_name && cell.state() == WorkerState::Connected
            })
            .map(|cell| cell.internal_name.clone())
            .collect();

        for name in primaries {
            let supervisor = self.clone();
            tokio::spawn(async move {
                supervisor.probe_one(&name).await;
            });
        }
    }

    pub(crate) async fn probe_one(&self, base: &str) {
        let Some(cell) = self.cell(base) else {
            return;
        };
        let Some(client) = cell.client() else {
            return;
        };

        let healthy = matches!(
            tokio::time::timeout(self.inner.config.health_timeout, client.list_tools()).await,
            Ok(Ok(_))
        );
        if healthy {
            return;
        }

        warn!(worker = %base, "health probe failed; restarting");
        self.emit(BusEvent::WorkerState {
            name: base.to_string(),
            status: "restarting".to_string(),
            reason: Some("health_check_failed".to_string()),
        });
        if let Err(e) = self.restart(base).await {
            warn!(worker = %base, "restart after failed probe failed: {e}");
        }
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;

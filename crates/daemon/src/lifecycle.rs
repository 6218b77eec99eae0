// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup and shutdown paths.
//!
//! Startup first reaps processes orphaned by a previous run (the pid
//! table may point at now-unrelated processes, so liveness is verified
//! with a null signal before escalating), clears the pid table, then
//! re-declares every persisted worker in parallel. Shutdown is a single
//! path with a hard deadline.

use crate::supervisor::Supervisor;
use futures_util::future::join_all;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::sync::Arc;
use std::time::Duration;
use swarm_client::ClientFactory;
use swarm_core::Clock;
use swarm_storage::Store;
use tracing::{info, warn};

/// Grace period between SIGTERM and SIGKILL during the orphan sweep.
const TERM_GRACE: Duration = Duration::from_secs(2);

/// Hard deadline for the whole shutdown path.
pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

fn pid_is_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    // Signal 0 probes for existence without delivering anything.
    kill(Pid::from_raw(pid), None).is_ok()
}

/// Terminate processes recorded by a previous run, then empty the table.
pub async fn sweep_orphans(store: &Store) {
    let entries = match store.process_ids() {
        Ok(entries) => entries,
        Err(e) => {
            warn!("pid table unreadable, skipping orphan sweep: {e}");
            return;
        }
    };

    let mut signalled = Vec::new();
    for (name, pid) in &entries {
        if !pid_is_alive(*pid) {
            continue;
        }
        info!(worker = %name, pid, "terminating orphaned worker process");
        let target = Pid::from_raw(*pid as i32);
        if let Err(e) = kill(target, Signal::SIGTERM) {
            warn!(worker = %name, pid, "SIGTERM failed: {e}");
            continue;
        }
        signalled.push((name.clone(), *pid));
    }

    if !signalled.is_empty() {
        tokio::time::sleep(TERM_GRACE).await;
        for (name, pid) in &signalled {
            if pid_is_alive(*pid) {
                warn!(worker = %name, pid, "escalating to SIGKILL");
                let _ = kill(Pid::from_raw(*pid as i32), Signal::SIGKILL);
            }
        }
    }

    // The table is empty before restoration begins.
    if let Err(e) = store.clear_process_ids() {
        warn!("pid table clear failed: {e}");
    }
}

/// Re-declare every persisted worker in parallel. Per-worker failures
/// are logged and non-fatal.
pub async fn restore_workers<F: ClientFactory, C: Clock>(supervisor: &Supervisor<F, C>) {
    let configs = match supervisor.store().list_workers() {
        Ok(configs) => configs,
        Err(e) => {
            warn!("worker restore skipped, store unreadable: {e}");
            return;
        }
    };
    if configs.is_empty() {
        return;
    }
    info!(count = configs.len(), "restoring persisted workers");

    let declares = configs.into_iter().map(|config| {
        let supervisor = supervisor.clone();
        async move {
            let name = config.name.clone();
            match supervisor.declare(config).await {
                Ok(snapshot) => {
                    info!(worker = %name, state = %snapshot.state, "restored");
                }
                Err(e) => warn!(worker = %name, "restore failed: {e}"),
            }
        }
    });
    join_all(declares).await;
}

/// The single shutdown path: stop every worker, then flush the store.
///
/// The caller wraps this in the [`SHUTDOWN_DEADLINE`] and force-exits
/// when it overruns.
pub async fn shutdown<F: ClientFactory, C: Clock>(
    supervisor: &Supervisor<F, C>,
    store: &Arc<Store>,
) {
    info!("shutting down");
    supervisor.stop_all().await;
    if let Err(e) = store.flush() {
        warn!("store flush failed: {e}");
    }
    info!("shutdown complete");
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

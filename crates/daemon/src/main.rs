// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! swarmd: the swarm supervisor daemon.

use std::sync::Arc;
use std::time::Instant;
use swarm_client::TransportFactory;
use swarm_core::{Mode, SwarmConfig, SystemClock};
use swarm_daemon::catalog::CatalogClient;
use swarm_daemon::event_bus::EventBus;
use swarm_daemon::http::{self, AppState};
use swarm_daemon::lifecycle::{self, SHUTDOWN_DEADLINE};
use swarm_daemon::mcp::ToolServer;
use swarm_daemon::profiles::ProfileManager;
use swarm_daemon::sessions::SessionRegistry;
use swarm_daemon::stdio_mode;
use swarm_daemon::supervisor::Supervisor;
use swarm_storage::Store;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(mode: Mode) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sled=warn,hyper=warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if mode == Mode::Stdio {
        // Stdout carries the protocol; logs go to stderr.
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let config = SwarmConfig::from_env();
    init_tracing(config.mode);

    if let Err(e) = run(config).await {
        error!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run(config: SwarmConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        return Err(format!("data dir {}: {e}", config.data_dir.display()).into());
    }
    let store = Arc::new(Store::open(&config.db_path)?);
    info!(db = %config.db_path.display(), mode = ?config.mode, "swarmd starting");

    // A previous run may have left worker processes behind; reap them
    // before anything new is spawned.
    lifecycle::sweep_orphans(&store).await;

    let supervisor = Supervisor::new(
        TransportFactory,
        SystemClock,
        config.clone(),
        Arc::clone(&store),
        EventBus::new(),
    );
    supervisor.start_background_tasks();
    lifecycle::restore_workers(&supervisor).await;

    let profiles = Arc::new(ProfileManager::new(Arc::clone(&store)));
    let catalog = Arc::new(CatalogClient::new());
    let tools = ToolServer::new(supervisor.clone(), profiles, catalog);

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let served = match config.mode {
        Mode::Stdio => stdio_mode::run(tools, shutdown.clone())
            .await
            .map_err(|e| e.to_string()),
        Mode::Http => {
            let sessions = SessionRegistry::new(supervisor.clone());
            sessions.spawn_gc(shutdown.clone());
            let state =
                AppState { sessions, tools, started_at: Instant::now() };
            http::serve(state, shutdown.clone())
                .await
                .map_err(|e| e.to_string())
        }
    };
    if let Err(e) = &served {
        error!("serve error: {e}");
    }

    // Single shutdown path with a hard deadline; overruns force-exit.
    let finished = tokio::time::timeout(SHUTDOWN_DEADLINE, async {
        lifecycle::shutdown(&supervisor, &store).await;
    })
    .await;
    if finished.is_err() {
        error!("shutdown overran {}s, forcing exit", SHUTDOWN_DEADLINE.as_secs());
        std::process::exit(1);
    }

    served.map_err(Into::into)
}

/// First SIGINT/SIGTERM starts the graceful path; a second one
/// force-exits immediately.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("signal handler install failed: {e}");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
            _ = sigterm.recv() => info!("SIGTERM received"),
        }
        shutdown.cancel();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        error!("second signal, exiting now");
        std::process::exit(130);
    });
}

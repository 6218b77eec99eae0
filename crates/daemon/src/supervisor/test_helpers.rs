// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for supervisor tests.

use super::Supervisor;
use crate::event_bus::EventBus;
use std::sync::Arc;
use swarm_client::fake::FakeClientFactory;
use swarm_core::{FakeClock, SwarmConfig, Transport, WorkerConfig};
use swarm_storage::Store;

pub(crate) struct TestHarness {
    pub supervisor: Supervisor<FakeClientFactory, FakeClock>,
    pub factory: FakeClientFactory,
    pub clock: FakeClock,
    pub store: Arc<Store>,
    _dir: tempfile::TempDir,
}

pub(crate) fn harness() -> TestHarness {
    harness_with(SwarmConfig::default())
}

pub(crate) fn harness_with(mut config: SwarmConfig) -> TestHarness {
    let dir = tempfile::tempdir().expect("tempdir");
    config.data_dir = dir.path().to_path_buf();
    config.db_path = dir.path().join("swarm.db");

    let store = Arc::new(Store::open(&config.db_path).expect("store"));
    let factory = FakeClientFactory::new();
    let clock = FakeClock::new();
    let supervisor = Supervisor::new(
        factory.clone(),
        clock.clone(),
        config,
        Arc::clone(&store),
        EventBus::new(),
    );
    TestHarness { supervisor, factory, clock, store, _dir: dir }
}

pub(crate) fn local_config(name: &str) -> WorkerConfig {
    WorkerConfig::local(name, "npx")
}

pub(crate) fn stateful_local_config(name: &str) -> WorkerConfig {
    let mut config = WorkerConfig::local(name, "npx");
    config.stateful = true;
    config
}

pub(crate) fn network_config(name: &str) -> WorkerConfig {
    WorkerConfig::network(name, Transport::StreamHttp, "http://127.0.0.1:9000/mcp")
}

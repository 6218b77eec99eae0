// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use swarm_core::WorkerConfig;

fn cell() -> Arc<InstanceCell> {
    InstanceCell::new(
        "fetch".into(),
        "fetch".into(),
        0,
        WorkerConfig::local("fetch", "npx"),
        100,
    )
}

#[test]
fn starts_connecting_and_idle() {
    let cell = cell();
    assert_eq!(cell.state(), WorkerState::Connecting);
    assert!(!cell.is_busy());
    assert!(cell.client().is_none());
    assert_eq!(cell.last_active_at(), 100);
}

#[test]
fn error_transition_drops_client_and_keeps_message() {
    let cell = cell();
    cell.set_error("connect refused");
    assert_eq!(cell.state(), WorkerState::Error);
    assert!(cell.client().is_none());
    assert_eq!(cell.last_error(), Some("connect refused".into()));
}

#[test]
fn reconnect_count_bumps_and_resets() {
    let cell = cell();
    assert_eq!(cell.bump_reconnect_count(), 1);
    assert_eq!(cell.bump_reconnect_count(), 2);
    cell.set_reconnect_count(0);
    assert_eq!(cell.reconnect_count(), 0);
}

#[test]
fn snapshot_reflects_current_data() {
    let cell = cell();
    cell.set_tools(vec![]);
    cell.touch(500);
    cell.set_busy(true);
    let snapshot = cell.snapshot();
    assert_eq!(snapshot.internal_name, "fetch");
    assert_eq!(snapshot.index, 0);
    assert!(snapshot.busy);
    assert_eq!(snapshot.last_active_at, 500);
}

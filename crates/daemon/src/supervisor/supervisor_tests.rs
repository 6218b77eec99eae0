// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::test_helpers::*;
use super::*;
use swarm_core::WorkerState;

#[tokio::test]
async fn declare_connects_and_caches_tools() {
    let h = harness();
    let snapshot = h.supervisor.declare(local_config("fetch")).await.unwrap();

    assert_eq!(snapshot.state, WorkerState::Connected);
    assert_eq!(snapshot.index, 0);
    assert_eq!(snapshot.internal_name, "fetch");
    assert_eq!(snapshot.cached_tools.len(), 1);
    assert!(snapshot.process_id.is_some());
    assert_eq!(h.factory.connect_count("fetch"), 1);
}

#[tokio::test]
async fn declare_failure_returns_error_snapshot() {
    let h = harness();
    h.factory.fail_connect("ghost", "connection refused");
    let snapshot = h.supervisor.declare(local_config("ghost")).await.unwrap();

    assert_eq!(snapshot.state, WorkerState::Error);
    assert!(snapshot.last_error.as_deref().unwrap_or("").contains("refused"));
    // The errored primary stays in the index, observable via list().
    assert!(h.supervisor.get("ghost").is_some());
}

#[tokio::test]
async fn declare_rejects_bad_input() {
    let h = harness();
    assert!(matches!(
        h.supervisor.declare(local_config("not a name")).await,
        Err(SwarmError::BadInput(_))
    ));
    assert!(matches!(
        h.supervisor.declare(local_config("fetch#1")).await,
        Err(SwarmError::BadInput(_))
    ));
    let mut no_command = local_config("fetch");
    no_command.command = None;
    assert!(matches!(
        h.supervisor.declare(no_command).await,
        Err(SwarmError::BadInput(_))
    ));
}

#[tokio::test]
async fn declare_replaces_existing_primary() {
    let h = harness();
    h.supervisor.declare(local_config("fetch")).await.unwrap();
    let first = h.factory.client("fetch").unwrap();

    h.supervisor.declare(local_config("fetch")).await.unwrap();
    assert!(first.is_closed());
    assert_eq!(h.factory.connect_count("fetch"), 2);
    // Still exactly one live instance for the base.
    assert_eq!(h.supervisor.cells_for_base("fetch").len(), 1);
}

#[tokio::test]
async fn stop_removes_from_live_index() {
    let h = harness();
    h.supervisor.declare(local_config("fetch")).await.unwrap();
    h.supervisor.stop("fetch").await.unwrap();

    assert!(h.supervisor.get("fetch").is_none());
    assert!(h.factory.client("fetch").unwrap().is_closed());
    // Idempotent.
    h.supervisor.stop("fetch").await.unwrap();
}

#[tokio::test]
async fn stop_clears_persisted_pid() {
    let h = harness();
    h.supervisor.declare(local_config("fetch")).await.unwrap();
    assert_eq!(h.store.process_ids().unwrap().len(), 1);
    h.supervisor.stop("fetch").await.unwrap();
    assert!(h.store.process_ids().unwrap().is_empty());
}

#[tokio::test]
async fn restart_reuses_the_declared_config() {
    let h = harness();
    let mut config = local_config("fetch");
    config.args = vec!["-y".into(), "@example/fetch".into()];
    h.supervisor.declare(config.clone()).await.unwrap();

    let snapshot = h.supervisor.restart("fetch").await.unwrap();
    assert_eq!(snapshot.state, WorkerState::Connected);
    assert_eq!(h.factory.connect_count("fetch"), 2);
    assert_eq!(h.supervisor.cell("fetch").unwrap().config(), config);
}

#[tokio::test]
async fn restart_unknown_worker_is_not_found() {
    let h = harness();
    assert!(matches!(
        h.supervisor.restart("nope").await,
        Err(SwarmError::NotFound(_))
    ));
}

#[tokio::test]
async fn direct_call_requires_connected() {
    let h = harness();
    assert!(matches!(
        h.supervisor.call("nope", "echo", serde_json::json!({})).await,
        Err(SwarmError::NotFound(_))
    ));

    h.factory.fail_connect("err", "boom");
    h.supervisor.declare(local_config("err")).await.unwrap();
    assert!(matches!(
        h.supervisor.call("err", "echo", serde_json::json!({})).await,
        Err(SwarmError::NotConnected(_))
    ));
}

#[tokio::test]
async fn call_queued_round_trips_through_the_pool() {
    let h = harness();
    h.supervisor.declare(local_config("fetch")).await.unwrap();

    let result = h
        .supervisor
        .call_queued("fetch", "echo", serde_json::json!({"msg": "hi"}), None)
        .await
        .unwrap();
    assert!(!result.is_error);

    let client = h.factory.client("fetch").unwrap();
    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].tool, "echo");
    assert_eq!(calls[0].args["msg"], "hi");
}

#[tokio::test]
async fn call_queued_unknown_base_is_not_found() {
    let h = harness();
    assert!(matches!(
        h.supervisor.call_queued("nope", "echo", serde_json::json!({}), None).await,
        Err(SwarmError::NotFound(_))
    ));
}

#[tokio::test]
async fn calls_on_one_instance_never_overlap() {
    let h = harness();
    h.factory.set_call_delay(std::time::Duration::from_millis(20));
    h.supervisor.declare(local_config("fetch")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..4 {
        let supervisor = h.supervisor.clone();
        handles.push(tokio::spawn(async move {
            supervisor
                .call_queued("fetch", "echo", serde_json::json!({"i": i}), None)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(h.factory.client("fetch").unwrap().max_concurrent_calls(), 1);
}

#[tokio::test]
async fn stop_all_cancels_future_calls() {
    let h = harness();
    h.supervisor.declare(local_config("fetch")).await.unwrap();
    h.supervisor.stop_all().await;

    assert!(h.supervisor.list().is_empty());
    assert!(matches!(
        h.supervisor.call_queued("fetch", "echo", serde_json::json!({}), None).await,
        Err(SwarmError::Cancelled(_))
    ));
}

#[tokio::test]
async fn worker_events_are_emitted_in_lifecycle_order() {
    let h = harness();
    let mut rx = h.supervisor.bus().subscribe();
    h.supervisor.declare(local_config("fetch")).await.unwrap();

    let mut statuses = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        match envelope.event {
            BusEvent::WorkerAdded { .. } => statuses.push("added".to_string()),
            BusEvent::WorkerState { status, .. } => statuses.push(status),
            _ => {}
        }
    }
    assert_eq!(statuses, vec!["added", "connecting", "connected"]);
}

#[tokio::test]
async fn tools_changed_updates_the_cache() {
    let h = harness();
    h.supervisor.declare(local_config("fetch")).await.unwrap();
    let client = h.factory.client("fetch").unwrap();

    client
        .trigger_tools_changed(vec![swarm_core::ToolDescriptor {
            name: "fetch_v2".into(),
            description: None,
            input_schema: serde_json::json!({"type": "object"}),
        }])
        .await;
    // Delivered over the instance's event channel.
    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let tools = h.supervisor.get("fetch").unwrap().cached_tools;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "fetch_v2");
}

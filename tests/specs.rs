// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level scenarios exercising the supervisor end to end with
//! scripted transports and a controllable clock.

use std::sync::Arc;
use std::time::Duration;
use swarm_client::fake::FakeClientFactory;
use swarm_core::{FakeClock, SessionId, SwarmConfig, SwarmError, WorkerConfig, WorkerState};
use swarm_daemon::event_bus::EventBus;
use swarm_daemon::sessions::SessionRegistry;
use swarm_daemon::supervisor::Supervisor;
use swarm_storage::Store;

struct World {
    supervisor: Supervisor<FakeClientFactory, FakeClock>,
    factory: FakeClientFactory,
    clock: FakeClock,
    store: Arc<Store>,
    _dir: tempfile::TempDir,
}

impl World {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = SwarmConfig::default();
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
        World { supervisor, factory, clock, store, _dir: dir }
    }

    fn stateful(name: &str) -> WorkerConfig {
        let mut config = WorkerConfig::local(name, "npx");
        config.stateful = true;
        config
    }
}

/// Scenario: two sessions calling a stateful base get isolated
/// instances; closing one session tears down only its instance.
#[tokio::test]
async fn stateful_session_isolation() {
    let world = World::new();
    world.supervisor.declare(World::stateful("browser")).await.unwrap();
    let registry = SessionRegistry::new(world.supervisor.clone());

    let s1 = registry.open().unwrap();
    let s2 = registry.open().unwrap();
    for session in [&s1, &s2] {
        world
            .supervisor
            .call_queued(
                "browser",
                "navigate",
                serde_json::json!({"url": "https://example.com"}),
                Some(&session.id),
            )
            .await
            .unwrap();
    }

    let p1 = format!("browser@{}", s1.id.prefix());
    let p2 = format!("browser@{}", s2.id.prefix());
    assert_ne!(p1, p2);
    assert_eq!(world.supervisor.get(&p1).unwrap().state, WorkerState::Connected);
    assert_eq!(world.supervisor.get(&p2).unwrap().state, WorkerState::Connected);

    registry.close(&s2.id).await;
    assert!(world.supervisor.get(&p2).is_none(), "closed session's instance is gone");
    assert_eq!(
        world.supervisor.get(&p1).unwrap().state,
        WorkerState::Connected,
        "surviving session is untouched"
    );
}

/// Scenario: sustained load on a slow worker grows the pool after the
/// scale-up wait, never past max_pool, and drains all queued calls.
#[tokio::test(start_paused = true)]
async fn pool_scales_under_sustained_load() {
    let world = World::new();
    world.factory.set_call_delay(Duration::from_secs(3));
    world.supervisor.declare(WorkerConfig::local("w", "npx")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..4 {
        let supervisor = world.supervisor.clone();
        handles.push(tokio::spawn(async move {
            supervisor.call_queued("w", "echo", serde_json::json!({"i": i}), None).await
        }));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The head of the queue has waited past scale_up_wait and the only
    // instance is busy: the tick signals scale-up.
    world.clock.advance(Duration::from_secs(6));
    world.supervisor.queue().on_tick();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        world.supervisor.get("w#1").is_some(),
        "pool grew by one after the scale-up wait"
    );

    // Keep ticking; growth stops at max_pool even though calls queue.
    for _ in 0..6 {
        world.clock.advance(Duration::from_secs(2));
        world.supervisor.queue().on_tick();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let pool: Vec<String> = world
        .supervisor
        .list()
        .into_iter()
        .filter(|s| s.base_name == "w")
        .map(|s| s.internal_name)
        .collect();
    assert!(pool.len() <= 4, "never past max_pool, got {pool:?}");

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!(!result.is_error);
    }

    // Index invariant: exactly one primary, no duplicate indices.
    let mut indices: Vec<u32> = world
        .supervisor
        .list()
        .into_iter()
        .filter(|s| s.base_name == "w")
        .map(|s| s.index)
        .collect();
    indices.sort_unstable();
    assert_eq!(indices.iter().filter(|i| **i == 0).count(), 1);
    let mut deduped = indices.clone();
    deduped.dedup();
    assert_eq!(deduped, indices, "no duplicate indices");
}

/// Scenario: calls queued for a base that is then stopped resolve
/// promptly with a server-stopped error instead of hanging to the TTL.
#[tokio::test]
async fn stopping_a_base_drains_its_queue() {
    let world = World::new();
    // The worker connects, then its transport is wedged: no instance is
    // ever registered with the queue, so calls just wait.
    world.factory.fail_connect("w", "never up");
    world.supervisor.declare(WorkerConfig::local("w", "npx")).await.unwrap();

    let supervisor = world.supervisor.clone();
    let pending = tokio::spawn(async move {
        supervisor.call_queued("w", "echo", serde_json::json!({}), None).await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    world.supervisor.stop("w").await.unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .expect("drained call must resolve promptly")
        .unwrap();
    match outcome {
        Err(SwarmError::Cancelled(msg)) => assert_eq!(msg, "server stopped"),
        other => panic!("expected server-stopped, got {other:?}"),
    }
}

/// Scenario: a queued call for a base with no usable instances expires
/// at the queue TTL with a timeout.
#[tokio::test]
async fn queued_call_expires_at_the_ttl() {
    let world = World::new();
    world.factory.fail_connect("w", "never up");
    world.supervisor.declare(WorkerConfig::local("w", "npx")).await.unwrap();

    let supervisor = world.supervisor.clone();
    let pending = tokio::spawn(async move {
        supervisor.call_queued("w", "echo", serde_json::json!({}), None).await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    world.clock.advance(Duration::from_secs(61));
    world.supervisor.queue().on_tick();

    match pending.await.unwrap() {
        Err(SwarmError::Timeout(msg)) => assert!(msg.contains("expired")),
        other => panic!("expected ttl timeout, got {other:?}"),
    }
}

/// Scenario: workers declared by one session are visible to every other
/// session, and their calls share one primary in FIFO order.
#[tokio::test]
async fn cross_session_visibility_and_shared_pool() {
    let world = World::new();
    let registry = SessionRegistry::new(world.supervisor.clone());
    let s1 = registry.open().unwrap();
    let s2 = registry.open().unwrap();

    // "Declared by S1" — declarations go to the shared supervisor.
    world.supervisor.declare(WorkerConfig::local("fetch", "npx")).await.unwrap();

    // S2 sees the same live state.
    let visible = world.supervisor.list();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].internal_name, "fetch");

    for (session, tag) in [(&s1, "one"), (&s2, "two")] {
        let result = world
            .supervisor
            .call_queued("fetch", "echo", serde_json::json!({"from": tag}), Some(&session.id))
            .await
            .unwrap();
        assert!(!result.is_error);
    }

    // Both calls hit the single shared primary, in enqueue order.
    let calls = world.factory.client("fetch").unwrap().calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].args["from"], "one");
    assert_eq!(calls[1].args["from"], "two");
    assert!(world.supervisor.get("fetch@dummy").is_none());
}

/// Round-trip property: declare, stop, start yields the same stored
/// config, and the pid table tracks live LOCAL workers.
#[tokio::test]
async fn persistence_round_trip_and_pid_tracking() {
    let world = World::new();
    let mut config = WorkerConfig::local("fetch", "npx");
    config.args = vec!["-y".into(), "@example/fetch".into()];
    config.env.insert("TOKEN".into(), "t".into());

    world.supervisor.declare(config.clone()).await.unwrap();
    world.store.save_worker(&config).unwrap();
    assert_eq!(world.store.process_ids().unwrap().len(), 1);

    world.supervisor.stop("fetch").await.unwrap();
    assert!(world.store.process_ids().unwrap().is_empty());
    assert_eq!(world.store.load_worker("fetch").unwrap(), Some(config.clone()));

    // Restore from the store (a fresh process would do exactly this).
    swarm_daemon::lifecycle::restore_workers(&world.supervisor).await;
    assert_eq!(world.supervisor.get("fetch").unwrap().state, WorkerState::Connected);
    assert_eq!(world.supervisor.list().len(), 1);
    assert_eq!(world.store.process_ids().unwrap().len(), 1);
    // The round-tripped config is byte-identical to the declaration.
    assert_eq!(world.store.load_worker("fetch").unwrap(), Some(config));
}

/// Tool-cache property: a tools_changed announcement is reflected in
/// subsequent listings.
#[tokio::test]
async fn tool_cache_follows_the_peer() {
    let world = World::new();
    world.supervisor.declare(WorkerConfig::local("fetch", "npx")).await.unwrap();

    world
        .factory
        .client("fetch")
        .unwrap()
        .trigger_tools_changed(vec![swarm_core::ToolDescriptor {
            name: "fetch_v2".into(),
            description: None,
            input_schema: serde_json::json!({"type": "object"}),
        }])
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let tools = world.supervisor.get("fetch").unwrap().cached_tools;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "fetch_v2");
}

/// Session-id prefixes differ between sessions even when ids share a
/// prefix length of eight.
#[tokio::test]
async fn session_prefixes_are_distinct_in_practice() {
    let a = SessionId::new();
    let b = SessionId::new();
    assert_ne!(a.prefix(), b.prefix());
}

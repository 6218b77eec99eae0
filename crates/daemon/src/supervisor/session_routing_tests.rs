// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::supervisor::test_helpers::*;
use swarm_core::WorkerState;

fn session(id: &str) -> SessionId {
    SessionId::from_string(id)
}

#[tokio::test]
async fn stateful_call_spawns_a_dedicated_instance() {
    let h = harness();
    h.supervisor.declare(stateful_local_config("browser")).await.unwrap();

    let s1 = session("a1b2c3d4e5f6");
    let result = h
        .supervisor
        .call_queued("browser", "navigate", serde_json::json!({"url": "x"}), Some(&s1))
        .await
        .unwrap();
    assert!(!result.is_error);

    let snapshot = h.supervisor.get("browser@a1b2c3d4").unwrap();
    assert_eq!(snapshot.state, WorkerState::Connected);
    assert!(snapshot.stateful);
    assert_ne!(snapshot.index, 0);

    // The call ran on the dedicated instance, not the primary.
    assert_eq!(h.factory.client("browser@a1b2c3d4").unwrap().calls().len(), 1);
    assert!(h.factory.client("browser").unwrap().calls().is_empty());
}

#[tokio::test]
async fn second_call_reuses_the_same_instance() {
    let h = harness();
    h.supervisor.declare(stateful_local_config("browser")).await.unwrap();
    let s1 = session("a1b2c3d4e5f6");

    for _ in 0..3 {
        h.supervisor
            .call_queued("browser", "navigate", serde_json::json!({}), Some(&s1))
            .await
            .unwrap();
    }
    assert_eq!(h.factory.connect_count("browser@a1b2c3d4"), 1);
    assert_eq!(h.factory.client("browser@a1b2c3d4").unwrap().calls().len(), 3);
}

#[tokio::test]
async fn sessions_are_isolated_from_each_other() {
    let h = harness();
    h.supervisor.declare(stateful_local_config("browser")).await.unwrap();

    let s1 = session("11111111aaaa");
    let s2 = session("22222222bbbb");
    h.supervisor
        .call_queued("browser", "navigate", serde_json::json!({}), Some(&s1))
        .await
        .unwrap();
    h.supervisor
        .call_queued("browser", "navigate", serde_json::json!({}), Some(&s2))
        .await
        .unwrap();

    assert!(h.supervisor.get("browser@11111111").is_some());
    assert!(h.supervisor.get("browser@22222222").is_some());

    // Closing one session leaves the other's instance connected.
    h.supervisor.release_session(&s2).await;
    assert!(h.supervisor.get("browser@22222222").is_none());
    assert_eq!(
        h.supervisor.get("browser@11111111").unwrap().state,
        WorkerState::Connected
    );
}

#[tokio::test]
async fn non_stateful_bases_ignore_the_session() {
    let h = harness();
    h.supervisor.declare(local_config("fetch")).await.unwrap();
    let s1 = session("a1b2c3d4e5f6");
    h.supervisor.call_queued("fetch", "echo", serde_json::json!({}), Some(&s1)).await.unwrap();

    assert!(h.supervisor.get("fetch@a1b2c3d4").is_none());
    assert_eq!(h.factory.client("fetch").unwrap().calls().len(), 1);
}

#[tokio::test]
async fn stdio_mode_has_no_session_and_shares_the_pool() {
    let h = harness();
    h.supervisor.declare(stateful_local_config("browser")).await.unwrap();
    // No session id: the stateful-isolation branch is not taken.
    h.supervisor.call_queued("browser", "navigate", serde_json::json!({}), None).await.unwrap();
    assert_eq!(h.supervisor.list().len(), 1);
    assert_eq!(h.factory.client("browser").unwrap().calls().len(), 1);
}

#[tokio::test]
async fn playwright_variant_gets_the_isolated_flag() {
    let h = harness();
    let mut config = stateful_local_config("playwright");
    config.args = vec!["-y".into(), "@playwright/mcp@latest".into()];
    h.supervisor.declare(config).await.unwrap();

    let s1 = session("a1b2c3d4e5f6");
    h.supervisor
        .call_queued("playwright", "navigate", serde_json::json!({}), Some(&s1))
        .await
        .unwrap();

    let spawned = h.supervisor.cell("playwright@a1b2c3d4").unwrap().config();
    assert!(spawned.args.iter().any(|a| a == "--isolated"));
    // The primary's declared args are untouched.
    let primary = h.supervisor.cell("playwright").unwrap().config();
    assert!(!primary.args.iter().any(|a| a == "--isolated"));
}

#[tokio::test]
async fn puppeteer_variant_gets_a_fresh_profile_dir() {
    let h = harness();
    let mut config = stateful_local_config("puppeteer");
    config.args = vec!["-y".into(), "puppeteer-mcp-server".into()];
    h.supervisor.declare(config).await.unwrap();

    let s1 = session("a1b2c3d4e5f6");
    h.supervisor
        .call_queued("puppeteer", "navigate", serde_json::json!({}), Some(&s1))
        .await
        .unwrap();

    let spawned = h.supervisor.cell("puppeteer@a1b2c3d4").unwrap().config();
    let profile_arg = spawned
        .args
        .iter()
        .find(|a| a.starts_with("--user-data-dir="))
        .expect("profile dir arg");
    let dir = std::path::PathBuf::from(profile_arg.trim_start_matches("--user-data-dir="));
    assert!(dir.exists(), "profile dir is created up front");

    // Teardown removes the allocated directory.
    h.supervisor.release_session(&s1).await;
    assert!(!dir.exists());
    assert!(h.supervisor.get("puppeteer@a1b2c3d4").is_none());
}

#[tokio::test]
async fn spawn_failure_surfaces_spawn_failed_and_retries_fresh() {
    let h = harness();
    h.supervisor.declare(stateful_local_config("browser")).await.unwrap();
    let s1 = session("a1b2c3d4e5f6");

    h.factory.fail_connect("browser@a1b2c3d4", "no display");
    match h
        .supervisor
        .call_queued("browser", "navigate", serde_json::json!({}), Some(&s1))
        .await
    {
        Err(SwarmError::SpawnFailed(msg)) => assert!(msg.contains("no display")),
        other => panic!("expected SpawnFailed, got {other:?}"),
    }
    assert!(h.supervisor.get("browser@a1b2c3d4").is_none(), "no errored residue");

    // Once the transport recovers, the next call spawns cleanly.
    h.factory.allow_connect("browser@a1b2c3d4");
    h.supervisor
        .call_queued("browser", "navigate", serde_json::json!({}), Some(&s1))
        .await
        .unwrap();
    assert!(h.supervisor.get("browser@a1b2c3d4").is_some());
}

#[test]
fn variant_heuristic_is_coarse_and_case_insensitive() {
    let mut config = swarm_core::WorkerConfig::local("w", "npx");
    assert_eq!(browser_variant(&config), None);

    config.args = vec!["@Playwright/mcp".into()];
    assert_eq!(browser_variant(&config), Some(BrowserVariant::IsolatedCapable));

    config.args = vec!["puppeteer-server".into()];
    assert_eq!(browser_variant(&config), Some(BrowserVariant::NeedsProfileDir));

    config.args = vec![];
    config.command = Some("puppeteer".into());
    assert_eq!(browser_variant(&config), Some(BrowserVariant::NeedsProfileDir));
}

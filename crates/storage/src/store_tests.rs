// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use swarm_core::{ProfileEntry, Transport};
use yare::parameterized;

fn open_temp() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("swarm.db")).unwrap();
    (dir, store)
}

#[test]
fn worker_round_trip_is_lossless() {
    let (_dir, store) = open_temp();
    let mut cfg = WorkerConfig::local("fetch", "npx");
    cfg.args = vec!["-y".into(), "@example/fetch".into()];
    cfg.env.insert("API_KEY".into(), "secret".into());
    cfg.description = "http fetcher".into();
    cfg.stateful = false;

    store.save_worker(&cfg).unwrap();
    assert_eq!(store.load_worker("fetch").unwrap(), Some(cfg.clone()));

    // Idempotence of declare -> stop -> start: the stored config never
    // drifts from what was declared.
    store.save_worker(&cfg).unwrap();
    assert_eq!(store.load_worker("fetch").unwrap(), Some(cfg));
}

#[parameterized(
    scaled = { "fetch#1" },
    session = { "browser@a1b2c3d4" },
)]
fn derived_names_are_never_persisted(name: &str) {
    let (_dir, store) = open_temp();
    let mut cfg = WorkerConfig::local(name, "npx");
    cfg.name = name.to_string();
    assert!(matches!(
        store.save_worker(&cfg),
        Err(StorageError::DerivedName(_))
    ));
    assert!(store.list_workers().unwrap().is_empty());
}

#[test]
fn delete_worker_reports_existence() {
    let (_dir, store) = open_temp();
    store.save_worker(&WorkerConfig::local("fetch", "npx")).unwrap();
    assert!(store.delete_worker("fetch").unwrap());
    assert!(!store.delete_worker("fetch").unwrap());
    assert_eq!(store.load_worker("fetch").unwrap(), None);
}

#[test]
fn list_workers_returns_everything() {
    let (_dir, store) = open_temp();
    store.save_worker(&WorkerConfig::local("a", "cmd")).unwrap();
    store
        .save_worker(&WorkerConfig::network("b", Transport::StreamHttp, "http://127.0.0.1/mcp"))
        .unwrap();
    let names: Vec<String> = store.list_workers().unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn process_id_table_lifecycle() {
    let (_dir, store) = open_temp();
    store.save_process_id("fetch", 1234).unwrap();
    store.save_process_id("browser", 5678).unwrap();

    let mut pids = store.process_ids().unwrap();
    pids.sort();
    assert_eq!(pids, vec![("browser".to_string(), 5678), ("fetch".to_string(), 1234)]);

    store.remove_process_id("fetch").unwrap();
    assert_eq!(store.process_ids().unwrap(), vec![("browser".to_string(), 5678)]);

    store.clear_process_ids().unwrap();
    assert!(store.process_ids().unwrap().is_empty());
}

#[test]
fn invalid_pid_entries_are_skipped() {
    let (_dir, store) = open_temp();
    store.save_process_id("good", 42).unwrap();
    store.process_ids.insert(b"bad", b"not-a-number".to_vec()).unwrap();
    assert_eq!(store.process_ids().unwrap(), vec![("good".to_string(), 42)]);
}

#[test]
fn profile_round_trip_strips_builtin_flag() {
    let (_dir, store) = open_temp();
    let bundle = ProfileBundle {
        name: "web".into(),
        description: "web tooling".into(),
        entries: vec![ProfileEntry {
            name: "fetch".into(),
            command: "npx".into(),
            args: vec![],
            env: Default::default(),
            description: String::new(),
        }],
        builtin: true,
    };
    store.save_profile(&bundle).unwrap();
    let loaded = store.load_profile("web").unwrap().unwrap();
    assert!(!loaded.builtin);
    assert_eq!(loaded.entries, bundle.entries);

    assert!(store.delete_profile("web").unwrap());
    assert!(!store.delete_profile("web").unwrap());
}

#[test]
fn reopen_preserves_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swarm.db");
    {
        let store = Store::open(&path).unwrap();
        store.save_worker(&WorkerConfig::local("fetch", "npx")).unwrap();
        store.flush().unwrap();
    }
    let store = Store::open(&path).unwrap();
    assert!(store.load_worker("fetch").unwrap().is_some());
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

fn clear_env(names: &[&str]) {
    for name in names {
        std::env::remove_var(format!("SWARM_{name}"));
        std::env::remove_var(format!("MCP_SWARM_{name}"));
    }
}

#[test]
#[serial]
fn defaults_match_documented_values() {
    clear_env(&["PORT", "MAX_SESSIONS", "QUEUE_TTL_MS", "MAX_POOL", "MODE"]);
    let cfg = SwarmConfig::default();
    assert_eq!(cfg.port, 7420);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.max_sessions, 50);
    assert_eq!(cfg.session_idle_timeout, Duration::from_secs(1800));
    assert_eq!(cfg.call_timeout, Duration::from_secs(60));
    assert_eq!(cfg.queue_ttl, Duration::from_secs(60));
    assert_eq!(cfg.max_pool, 4);
    assert_eq!(cfg.scale_up_wait, Duration::from_secs(5));
    assert_eq!(cfg.idle_kill, Duration::from_secs(60));
    assert_eq!(cfg.health_interval, Duration::from_secs(60));
    assert_eq!(cfg.health_timeout, Duration::from_secs(10));
    assert!(!cfg.cors);
}

#[test]
#[serial]
fn env_overrides_are_applied() {
    clear_env(&["PORT", "MAX_POOL", "MODE", "CORS"]);
    std::env::set_var("SWARM_PORT", "9999");
    std::env::set_var("SWARM_MAX_POOL", "8");
    std::env::set_var("SWARM_MODE", "stdio");
    std::env::set_var("SWARM_CORS", "true");

    let cfg = SwarmConfig::from_env();
    assert_eq!(cfg.port, 9999);
    assert_eq!(cfg.max_pool, 8);
    assert_eq!(cfg.mode, Mode::Stdio);
    assert!(cfg.cors);

    clear_env(&["PORT", "MAX_POOL", "MODE", "CORS"]);
}

#[test]
#[serial]
fn legacy_alias_is_honored() {
    clear_env(&["PORT"]);
    std::env::set_var("MCP_SWARM_PORT", "4321");
    let cfg = SwarmConfig::from_env();
    assert_eq!(cfg.port, 4321);
    clear_env(&["PORT"]);
}

#[test]
#[serial]
fn primary_prefix_wins_over_legacy() {
    clear_env(&["PORT"]);
    std::env::set_var("SWARM_PORT", "1111");
    std::env::set_var("MCP_SWARM_PORT", "2222");
    let cfg = SwarmConfig::from_env();
    assert_eq!(cfg.port, 1111);
    clear_env(&["PORT"]);
}

#[test]
fn stateful_name_set() {
    assert!(is_stateful_name("playwright"));
    assert!(is_stateful_name("puppeteer"));
    assert!(!is_stateful_name("fetch"));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

#[parameterized(
    scoped = { "@modelcontextprotocol/server-filesystem", "filesystem" },
    registry_prefix = { "mcp-server-git", "git" },
    plain_prefix = { "server-fetch", "fetch" },
    mcp_prefix = { "mcp-browser", "browser" },
    mixed_case = { "@Foo/MCP-Server-Sqlite", "sqlite" },
    punctuation = { "web_search!", "websearch" },
)]
fn normalization(raw: &str, expected: &str) {
    assert_eq!(normalize_name(raw), expected);
}

fn entry(name: &str, install: Option<&str>, popularity: u64) -> CatalogEntry {
    CatalogEntry {
        name: name.into(),
        description: String::new(),
        install: install.map(String::from),
        source: "npm",
        popularity,
    }
}

#[test]
fn dedupe_prefers_installable_entries() {
    let ranked = rank(
        vec![
            entry("mcp-server-fetch", None, 9000),
            entry("@example/server-fetch", Some("@example/server-fetch"), 10),
        ],
        10,
    );
    assert_eq!(ranked.len(), 1);
    assert!(ranked[0].install.is_some());
}

#[test]
fn dedupe_prefers_popularity_among_equals() {
    let ranked = rank(
        vec![
            entry("server-git", Some("server-git"), 5),
            entry("@scope/mcp-server-git", Some("@scope/mcp-server-git"), 500),
        ],
        10,
    );
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].popularity, 500);
}

#[test]
fn ranking_puts_installable_first_then_popular() {
    let ranked = rank(
        vec![
            entry("alpha", None, 10_000),
            entry("beta", Some("beta"), 5),
            entry("gamma", Some("gamma"), 500),
        ],
        10,
    );
    let names: Vec<&str> = ranked.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["gamma", "beta", "alpha"]);
}

#[test]
fn limit_truncates() {
    let entries = (0..20).map(|i| entry(&format!("pkg-{i}"), Some("x"), i)).collect();
    assert_eq!(rank(entries, 10).len(), 10);
}

#[test]
fn official_registry_payload_parses() {
    let body = json!({
        "servers": [{
            "name": "io.github.example/fetch",
            "description": "fetches things",
            "packages": [{"registry_type": "npm", "identifier": "@example/fetch"}]
        }]
    });
    let entries = parse_official_registry(&body);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].install.as_deref(), Some("@example/fetch"));
}

#[test]
fn npm_payload_parses_with_downloads() {
    let body = json!({
        "objects": [{
            "package": {"name": "mcp-server-fetch", "description": "d"},
            "downloads": {"weekly": 1234}
        }]
    });
    let entries = parse_npm(&body);
    assert_eq!(entries[0].popularity, 1234);
    assert_eq!(entries[0].install.as_deref(), Some("mcp-server-fetch"));
}

#[test]
fn malformed_payloads_yield_nothing() {
    assert!(parse_official_registry(&json!({"unexpected": true})).is_empty());
    assert!(parse_pulse(&json!([1, 2, 3])).is_empty());
    assert!(parse_npm(&json!({"objects": [{"package": {}}]})).is_empty());
}

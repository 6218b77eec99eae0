// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External catalog discovery.
//!
//! Queries up to three upstream catalogs in parallel, each bounded to
//! 8 s, then dedupes by normalized name, prefers entries with an
//! installable identifier, and ranks by popularity. Per-source failures
//! are swallowed; discovery is best effort.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Per-source request budget.
const SOURCE_TIMEOUT: Duration = Duration::from_secs(8);

/// Default result cap.
pub const DEFAULT_LIMIT: usize = 10;

/// One discovered catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    /// Installable identifier (package name) when the source carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<String>,
    pub source: &'static str,
    pub popularity: u64,
}

/// Collapse a raw name for dedupe: strip the scope prefix, strip
/// registry noise prefixes, lowercase, drop non-alphanumerics.
pub(crate) fn normalize_name(raw: &str) -> String {
    let mut name = raw.trim();
    if name.starts_with('@') {
        if let Some((_, rest)) = name.split_once('/') {
            name = rest;
        }
    }
    let lowered = name.to_ascii_lowercase();
    let mut stripped = lowered.as_str();
    for prefix in ["mcp-server-", "server-", "mcp-"] {
        if let Some(rest) = stripped.strip_prefix(prefix) {
            stripped = rest;
            break;
        }
    }
    stripped.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Dedupe by normalized name (installable entries win), then sort by
/// presence-of-install and popularity descending.
pub(crate) fn rank(entries: Vec<CatalogEntry>, limit: usize) -> Vec<CatalogEntry> {
    let mut by_name: HashMap<String, CatalogEntry> = HashMap::new();
    for entry in entries {
        let key = normalize_name(&entry.name);
        match by_name.get(&key) {
            Some(existing) => {
                let better_install = entry.install.is_some() && existing.install.is_none();
                let more_popular =
                    entry.install.is_some() == existing.install.is_some()
                        && entry.popularity > existing.popularity;
                if better_install || more_popular {
                    by_name.insert(key, entry);
                }
            }
            None => {
                by_name.insert(key, entry);
            }
        }
    }
    let mut ranked: Vec<CatalogEntry> = by_name.into_values().collect();
    ranked.sort_by(|a, b| {
        b.install
            .is_some()
            .cmp(&a.install.is_some())
            .then(b.popularity.cmp(&a.popularity))
            .then(a.name.cmp(&b.name))
    });
    ranked.truncate(limit);
    ranked
}

/// Client over the three upstream catalogs.
pub struct CatalogClient {
    http: reqwest::Client,
}

impl Default for CatalogClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogClient {
    pub fn new() -> Self {
        Self { http: reqwest::Client::new() }
    }

    /// Ranked discovery results; empty on total network failure.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<CatalogEntry> {
        let (registry, pulse, npm) = tokio::join!(
            self.query_source("registry", self.official_registry(query)),
            self.query_source("pulsemcp", self.pulse(query)),
            self.query_source("npm", self.npm(query)),
        );
        let mut entries = registry;
        entries.extend(pulse);
        entries.extend(npm);
        rank(entries, limit)
    }

    async fn query_source(
        &self,
        source: &'static str,
        fut: impl std::future::Future<Output = Result<Vec<CatalogEntry>, reqwest::Error>>,
    ) -> Vec<CatalogEntry> {
        match tokio::time::timeout(SOURCE_TIMEOUT, fut).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                debug!(source, "catalog source failed: {e}");
                Vec::new()
            }
            Err(_) => {
                debug!(source, "catalog source timed out");
                Vec::new()
            }
        }
    }

    async fn official_registry(&self, query: &str) -> Result<Vec<CatalogEntry>, reqwest::Error> {
        let body: Value = self
            .http
            .get("https://registry.modelcontextprotocol.io/v0/servers")
            .query(&[("search", query), ("limit", "30")])
            .send()
            .await?
            .json()
            .await?;
        Ok(parse_official_registry(&body))
    }

    async fn pulse(&self, query: &str) -> Result<Vec<CatalogEntry>, reqwest::Error> {
        let body: Value = self
            .http
            .get("https://api.pulsemcp.com/v0beta/servers")
            .query(&[("query", query), ("count_per_page", "30")])
            .send()
            .await?
            .json()
            .await?;
        Ok(parse_pulse(&body))
    }

    async fn npm(&self, query: &str) -> Result<Vec<CatalogEntry>, reqwest::Error> {
        let text = format!("mcp server {query}");
        let body: Value = self
            .http
            .get("https://registry.npmjs.org/-/v1/search")
            .query(&[("text", text.as_str()), ("size", "30")])
            .send()
            .await?
            .json()
            .await?;
        Ok(parse_npm(&body))
    }
}

pub(crate) fn parse_official_registry(body: &Value) -> Vec<CatalogEntry> {
    let servers = body.get("servers").and_then(Value::as_array);
    servers
        .into_iter()
        .flatten()
        .filter_map(|server| {
            let name = server.get("name")?.as_str()?.to_string();
            let install = server
                .get("packages")
                .and_then(Value::as_array)
                .and_then(|packages| packages.first())
                .and_then(|p| p.get("identifier"))
                .and_then(Value::as_str)
                .map(String::from);
            Some(CatalogEntry {
                description: server
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                install,
                source: "registry",
                popularity: 0,
                name,
            })
        })
        .collect()
}

pub(crate) fn parse_pulse(body: &Value) -> Vec<CatalogEntry> {
    let servers = body.get("servers").and_then(Value::as_array);
    servers
        .into_iter()
        .flatten()
        .filter_map(|server| {
            let name = server.get("name")?.as_str()?.to_string();
            Some(CatalogEntry {
                description: server
                    .get("short_description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                install: server
                    .get("package_name")
                    .and_then(Value::as_str)
                    .map(String::from),
                source: "pulsemcp",
                popularity: server
                    .get("github_stars")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
                name,
            })
        })
        .collect()
}

pub(crate) fn parse_npm(body: &Value) -> Vec<CatalogEntry> {
    let objects = body.get("objects").and_then(Value::as_array);
    objects
        .into_iter()
        .flatten()
        .filter_map(|object| {
            let package = object.get("package")?;
            let name = package.get("name")?.as_str()?.to_string();
            let downloads = object
                .get("downloads")
                .and_then(|d| d.get("weekly"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Some(CatalogEntry {
                description: package
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                install: Some(name.clone()),
                source: "npm",
                popularity: downloads,
                name,
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;

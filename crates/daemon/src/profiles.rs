// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Profile bundles: built-in descriptor plus user bundles in the store.
//!
//! Built-ins are compiled in and read-only; a user bundle with a
//! built-in's name is shadowed in listings and can never be created or
//! deleted through the API.

use serde::Deserialize;
use std::sync::Arc;
use swarm_core::{worker, ProfileBundle, ProfileEntry, SwarmError};
use swarm_storage::Store;
use tracing::error;

/// Compiled-in profile descriptor.
const BUILTIN_PROFILES: &str = r#"
[[profile]]
name = "dev-tools"
description = "Filesystem, shell and source-control helpers"

[[profile.entry]]
name = "filesystem"
command = "npx"
args = ["-y", "@modelcontextprotocol/server-filesystem", "."]
description = "Read and write files under the working directory"

[[profile.entry]]
name = "git"
command = "uvx"
args = ["mcp-server-git"]
description = "Inspect and mutate git repositories"

[[profile]]
name = "web-automation"
description = "Browser driving and scraping"

[[profile.entry]]
name = "playwright"
command = "npx"
args = ["-y", "@playwright/mcp@latest"]
description = "Drive a real browser via Playwright"

[[profile.entry]]
name = "fetch"
command = "uvx"
args = ["mcp-server-fetch"]
description = "Fetch and convert web content"

[[profile]]
name = "research"
description = "Search and retrieval"

[[profile.entry]]
name = "fetch"
command = "uvx"
args = ["mcp-server-fetch"]
description = "Fetch and convert web content"

[[profile.entry]]
name = "memory"
command = "npx"
args = ["-y", "@modelcontextprotocol/server-memory"]
description = "Persistent knowledge-graph memory"
"#;

#[derive(Debug, Deserialize)]
struct Descriptor {
    #[serde(default, rename = "profile")]
    profiles: Vec<DescriptorProfile>,
}

#[derive(Debug, Deserialize)]
struct DescriptorProfile {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "entry")]
    entries: Vec<ProfileEntry>,
}

fn parse_builtins(text: &str) -> Vec<ProfileBundle> {
    let descriptor: Descriptor = match toml::from_str(text) {
        Ok(d) => d,
        Err(e) => {
            error!("built-in profile descriptor is invalid: {e}");
            return Vec::new();
        }
    };
    descriptor
        .profiles
        .into_iter()
        .map(|p| ProfileBundle {
            name: p.name,
            description: p.description,
            entries: p.entries,
            builtin: true,
        })
        .collect()
}

/// Merged view over built-in and user bundles.
pub struct ProfileManager {
    store: Arc<Store>,
    builtins: Vec<ProfileBundle>,
}

impl ProfileManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store, builtins: parse_builtins(BUILTIN_PROFILES) }
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.iter().any(|b| b.name == name)
    }

    /// All bundles; built-ins first, shadowing same-named user bundles.
    pub fn list(&self) -> Vec<ProfileBundle> {
        let mut bundles = self.builtins.clone();
        let user = self.store.list_profiles().unwrap_or_default();
        for bundle in user {
            if !self.is_builtin(&bundle.name) {
                bundles.push(bundle);
            }
        }
        bundles
    }

    pub fn get(&self, name: &str) -> Result<ProfileBundle, SwarmError> {
        if let Some(builtin) = self.builtins.iter().find(|b| b.name == name) {
            return Ok(builtin.clone());
        }
        self.store
            .load_profile(name)
            .map_err(|e| SwarmError::Internal(e.to_string()))?
            .ok_or_else(|| SwarmError::NotFound(format!("profile '{name}'")))
    }

    /// Persist a user bundle. Built-in names can never be overwritten.
    pub fn create(&self, bundle: ProfileBundle) -> Result<(), SwarmError> {
        if !worker::is_valid_name(&bundle.name) {
            return Err(SwarmError::BadInput(format!(
                "profile name '{}' must match [A-Za-z0-9_-]+",
                bundle.name
            )));
        }
        if bundle.entries.is_empty() {
            return Err(SwarmError::BadInput("profile needs at least one entry".into()));
        }
        if self.is_builtin(&bundle.name) {
            return Err(SwarmError::Conflict(format!(
                "'{}' is a built-in profile",
                bundle.name
            )));
        }
        self.store.save_profile(&bundle).map_err(|e| SwarmError::Internal(e.to_string()))
    }

    /// Delete a user bundle; built-ins are protected.
    pub fn delete(&self, name: &str) -> Result<(), SwarmError> {
        if self.is_builtin(name) {
            return Err(SwarmError::Protected(format!("'{name}' is a built-in profile")));
        }
        let existed = self
            .store
            .delete_profile(name)
            .map_err(|e| SwarmError::Internal(e.to_string()))?;
        if !existed {
            return Err(SwarmError::NotFound(format!("profile '{name}'")));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "profiles_tests.rs"]
mod tests;

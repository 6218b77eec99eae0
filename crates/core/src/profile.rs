// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Profile bundles: named groups of worker declarations.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One worker declaration inside a profile bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub name: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
    #[serde(default)]
    pub description: String,
}

/// A named group of worker declarations.
///
/// Built-in bundles are loaded from a compiled-in descriptor and shadow
/// same-named user bundles; user bundles live in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileBundle {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub entries: Vec<ProfileEntry>,
    /// True for compiled-in bundles; never persisted as true.
    #[serde(default)]
    pub builtin: bool,
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;

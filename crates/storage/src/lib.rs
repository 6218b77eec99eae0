// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! swarm-storage: the persistence gateway.
//!
//! Three logical tables over one embedded sled database: `workers` keyed
//! by base name, `process_ids` keyed by base name, and `user_profiles`
//! keyed by bundle name. Values are JSON blobs. Sled gives reader-safe
//! concurrent reads with serialized writes, which is all the supervisor
//! requires.

use std::path::Path;
use swarm_core::{instance, ProfileBundle, WorkerConfig};
use thiserror::Error;
use tracing::debug;

/// Storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: sled::Error,
    },

    #[error("store error: {0}")]
    Db(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("derived instance '{0}' is never persisted")]
    DerivedName(String),
}

/// Handle to the three persistence tables.
pub struct Store {
    db: sled::Db,
    workers: sled::Tree,
    process_ids: sled::Tree,
    user_profiles: sled::Tree,
}

impl Store {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|source| StorageError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            workers: db.open_tree("workers")?,
            process_ids: db.open_tree("process_ids")?,
            user_profiles: db.open_tree("user_profiles")?,
            db,
        })
    }

    /// Flush pending writes to disk. Called on shutdown.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    // -- workers --

    /// Persist one declared worker config, keyed by its name.
    ///
    /// Derived instances (`#`/`@` in the name) never shadow primaries in
    /// the store; saving one is an error at this layer.
    pub fn save_worker(&self, config: &WorkerConfig) -> Result<(), StorageError> {
        if instance::is_derived(&config.name) {
            return Err(StorageError::DerivedName(config.name.clone()));
        }
        let value = serde_json::to_vec(config)?;
        self.workers.insert(config.name.as_bytes(), value)?;
        debug!(worker = %config.name, "persisted worker config");
        Ok(())
    }

    pub fn load_worker(&self, name: &str) -> Result<Option<WorkerConfig>, StorageError> {
        match self.workers.get(name.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Remove a persisted config. True if it existed.
    pub fn delete_worker(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.workers.remove(name.as_bytes())?.is_some())
    }

    /// All persisted configs, sorted by name (sled iterates key order).
    pub fn list_workers(&self) -> Result<Vec<WorkerConfig>, StorageError> {
        let mut configs = Vec::new();
        for entry in self.workers.iter() {
            let (_, value) = entry?;
            configs.push(serde_json::from_slice(&value)?);
        }
        Ok(configs)
    }

    // -- process ids --

    pub fn save_process_id(&self, name: &str, pid: u32) -> Result<(), StorageError> {
        self.process_ids.insert(name.as_bytes(), serde_json::to_vec(&pid)?)?;
        Ok(())
    }

    pub fn remove_process_id(&self, name: &str) -> Result<(), StorageError> {
        self.process_ids.remove(name.as_bytes())?;
        Ok(())
    }

    /// Every recorded pid. Entries that fail to decode are skipped; the
    /// startup sweep treats them as invalid.
    pub fn process_ids(&self) -> Result<Vec<(String, u32)>, StorageError> {
        let mut pids = Vec::new();
        for entry in self.process_ids.iter() {
            let (key, value) = entry?;
            let name = String::from_utf8_lossy(&key).into_owned();
            match serde_json::from_slice::<u32>(&value) {
                Ok(pid) => pids.push((name, pid)),
                Err(e) => debug!(worker = %name, "skipping invalid pid entry: {e}"),
            }
        }
        Ok(pids)
    }

    /// Empty the pid table. Runs before restoration begins at startup.
    pub fn clear_process_ids(&self) -> Result<(), StorageError> {
        self.process_ids.clear()?;
        Ok(())
    }

    // -- user profiles --

    /// Persist one user bundle. The `builtin` flag is never stored as set.
    pub fn save_profile(&self, bundle: &ProfileBundle) -> Result<(), StorageError> {
        let mut stored = bundle.clone();
        stored.builtin = false;
        let value = serde_json::to_vec(&stored)?;
        self.user_profiles.insert(stored.name.as_bytes(), value)?;
        Ok(())
    }

    pub fn load_profile(&self, name: &str) -> Result<Option<ProfileBundle>, StorageError> {
        match self.user_profiles.get(name.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Remove a user bundle. True if it existed.
    pub fn delete_profile(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.user_profiles.remove(name.as_bytes())?.is_some())
    }

    pub fn list_profiles(&self) -> Result<Vec<ProfileBundle>, StorageError> {
        let mut bundles = Vec::new();
        for entry in self.user_profiles.iter() {
            let (_, value) = entry?;
            bundles.push(serde_json::from_slice(&value)?);
        }
        Ok(bundles)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

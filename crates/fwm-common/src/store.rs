//! ---
//! fwm_section: "01-core-functionality"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Shared primitives and utilities for the client runtime."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! Local persisted key/value storage.
//!
//! The store is a cache only: it holds the bearer token and a copy of the
//! signed-in user's profile so that start-up can render something before the
//! backend answers. The remote copy stays authoritative.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised by [`LocalStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// String-keyed persisted storage.
pub trait LocalStore: Send + Sync {
    /// Read the raw value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;
    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    /// List every key currently stored, in sorted order.
    fn keys(&self) -> Vec<String>;
}

/// Typed helpers layered over any [`LocalStore`].
pub trait LocalStoreExt: LocalStore {
    /// Deserialize the JSON value under `key`; malformed entries read as absent.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "discarding malformed cached entry");
                None
            }
        }
    }

    /// Serialize `value` to JSON and store it under `key`.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw)
    }

    /// Remove every key that is not listed in `preserved`. Returns the removed keys.
    fn retain_only(&self, preserved: &[String]) -> Result<Vec<String>, StoreError> {
        let mut removed = Vec::new();
        for key in self.keys() {
            if preserved.iter().any(|keep| keep == &key) {
                continue;
            }
            self.remove(&key)?;
            removed.push(key);
        }
        Ok(removed)
    }
}

impl<S: LocalStore + ?Sized> LocalStoreExt for S {}

/// Volatile store used by tests and short-lived processes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

/// JSON-file backed store. Every write rewrites the whole file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "local store opened");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let serialized = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, serialized).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        entries.insert(key.to_owned(), value);
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        theme: String,
    }

    #[test]
    fn json_helpers_round_trip_through_memory_store() {
        let store = MemoryStore::new();
        store
            .set_json("prefs", &Prefs { theme: "dark".into() })
            .unwrap();
        let prefs: Prefs = store.get_json("prefs").unwrap();
        assert_eq!(prefs.theme, "dark");
    }

    #[test]
    fn malformed_json_reads_as_absent() {
        let store = MemoryStore::new();
        store.set("prefs", "{not json".into()).unwrap();
        assert!(store.get_json::<Prefs>("prefs").is_none());
    }

    #[test]
    fn retain_only_keeps_allow_list() {
        let store = MemoryStore::new();
        for key in ["language", "theme", "user_id", "user_profile", "auth_token"] {
            store.set(key, "x".into()).unwrap();
        }
        let removed = store
            .retain_only(&["language".to_owned(), "theme".to_owned()])
            .unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(store.keys(), vec!["language", "theme"]);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        {
            let store = FileStore::open(&path).unwrap();
            store.set("user_id", "u-1".into()).unwrap();
            store.set("theme", "light".into()).unwrap();
            store.remove("theme").unwrap();
        }
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("user_id").as_deref(), Some("u-1"));
        assert!(reopened.get("theme").is_none());
    }
}

//! Durable Session Storage
//!
//! String-valued key-value mirror of the in-memory session, persistent
//! across process restarts. The session store writes every key after its
//! in-memory state is fully updated and removes every key on logout, so a
//! restore sees either a complete session or none.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Storage keys mirrored from the session
pub mod keys {
    pub const TOKEN: &str = "token";
    pub const USER_ID: &str = "userId";
    pub const USER: &str = "user";
    pub const ROLE_IDS: &str = "roleIds";
    pub const PERMISSION_IDS: &str = "permissionIds";
    pub const PERMISSION_NAMES: &str = "permissionNames";

    /// Every key the session mirrors, in write order
    pub const ALL: &[&str] = &[TOKEN, USER_ID, USER, ROLE_IDS, PERMISSION_IDS, PERMISSION_NAMES];
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable string key-value store for session state
pub trait SessionStorage: Send + Sync {
    /// Read a value, `None` when absent
    fn get(&self, key: &str) -> Option<String>;

    /// Write a single key durably
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key; absent keys are not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// File-backed storage: a single JSON object flushed on every mutation
pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStorage {
    /// Open storage at the given path, loading any existing entries
    ///
    /// An unreadable or malformed file starts the store empty rather than
    /// failing open; a stale session is recoverable, a dead client is not.
    pub fn open(path: PathBuf) -> Result<Self, StorageError> {
        let entries = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data).unwrap_or_else(|e| {
                tracing::warn!("Discarding malformed session file {}: {}", path.display(), e);
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// In-process storage for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

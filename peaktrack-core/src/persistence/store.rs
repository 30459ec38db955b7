//! Key/value storage collaborators.
//!
//! The tracker only needs three operations from its store: a full scan at
//! load time, a batched put, and a batched delete. [`MemoryStore`] backs
//! tests and embedding; [`JsonFileStore`] keeps the whole map in a single
//! JSON document on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding failed: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Batched key/value storage.
pub trait KvStore {
    /// Full scan of every stored entry.
    fn list(&self) -> Result<Vec<(String, String)>, StoreError>;

    /// Write a batch of entries.
    fn put(&mut self, entries: BTreeMap<String, String>) -> Result<(), StoreError>;

    /// Delete a batch of keys. Unknown keys are ignored.
    fn delete(&mut self, keys: &[String]) -> Result<(), StoreError>;
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

impl KvStore for MemoryStore {
    fn list(&self) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn put(&mut self, entries: BTreeMap<String, String>) -> Result<(), StoreError> {
        self.entries.extend(entries);
        Ok(())
    }

    fn delete(&mut self, keys: &[String]) -> Result<(), StoreError> {
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }
}

/// Store persisted as one JSON document on disk.
///
/// The whole map is rewritten on every batch; entry counts here are small
/// (one per open position), so a single document beats a file per key.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open a store file, creating an empty store if the file is absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl KvStore for JsonFileStore {
    fn list(&self) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn put(&mut self, entries: BTreeMap<String, String>) -> Result<(), StoreError> {
        self.entries.extend(entries);
        self.persist()
    }

    fn delete(&mut self, keys: &[String]) -> Result<(), StoreError> {
        for key in keys {
            self.entries.remove(key);
        }
        self.persist()
    }
}

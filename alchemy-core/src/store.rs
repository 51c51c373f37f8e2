//! Local persistence of discoveries, table and active page.
//!
//! Three independent records are kept in a string key-value store. Each is
//! read at startup with its own fallback, so one corrupt record never costs
//! the others.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::{DiscoverySet, Table, TableSnapshot, Token};

/// Record key of the discovery list.
pub const DISCOVERED_KEY: &str = "alchemy_discovered";

/// Record key of the table snapshot.
pub const TABLE_KEY: &str = "alchemy_table";

/// Record key of the active palette page.
pub const PAGE_KEY: &str = "alchemy_page";

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred during persistence.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// String key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-memory store, shareable across clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self
            .values
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self
            .values
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `data_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    /// The data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.json", sanitize_filename(key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

/// Replace characters that are unsafe in file names.
#[must_use]
pub fn sanitize_filename(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Everything restored from local storage at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSnapshot {
    /// Discovered names.
    pub discovered: DiscoverySet,
    /// Table tokens in z-order.
    pub table: Vec<Token>,
    /// Active palette page.
    pub page: usize,
}

impl Default for LocalSnapshot {
    fn default() -> Self {
        Self {
            discovered: DiscoverySet::new(),
            table: Vec::new(),
            page: 0,
        }
    }
}

/// Typed access to the three local records.
#[derive(Debug, Clone)]
pub struct LocalProgress<S> {
    store: S,
}

impl<S: KeyValueStore> LocalProgress<S> {
    /// Wrap a key-value store.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Load every record, falling back to defaults per record.
    ///
    /// Never fails: missing or malformed records are logged and replaced.
    #[must_use]
    pub fn load(&self) -> LocalSnapshot {
        let discovered = self
            .read::<DiscoverySet>(DISCOVERED_KEY)
            .unwrap_or_default();
        let table = self
            .read::<TableSnapshot>(TABLE_KEY)
            .map(|snapshot| snapshot.0)
            .unwrap_or_default();
        let page = self.read::<usize>(PAGE_KEY).unwrap_or_default();
        tracing::debug!(
            "Loaded local progress: {} discovered, {} tokens, page {page}",
            discovered.len(),
            table.len()
        );
        LocalSnapshot {
            discovered,
            table,
            page,
        }
    }

    fn read<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read {key}: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring malformed {key}: {e}");
                None
            }
        }
    }

    /// Persist the discovery list.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_discovered(&self, discovered: &DiscoverySet) -> Result<(), StoreError> {
        self.store
            .set(DISCOVERED_KEY, &serde_json::to_string(discovered)?)
    }

    /// Persist the table.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_table(&self, table: &Table) -> Result<(), StoreError> {
        self.store
            .set(TABLE_KEY, &serde_json::to_string(&table.snapshot())?)
    }

    /// Persist the active page.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save_page(&self, page: usize) -> Result<(), StoreError> {
        self.store.set(PAGE_KEY, &page.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_when_empty() {
        let local = LocalProgress::new(MemoryStore::new());
        assert_eq!(local.load(), LocalSnapshot::default());
    }

    #[test]
    fn test_each_record_falls_back_independently() {
        let store = MemoryStore::new();
        store.set(DISCOVERED_KEY, "not json").expect("set");
        store
            .set(TABLE_KEY, r#"[{"id": "el-4", "name": "steam", "x": 5, "y": 6}]"#)
            .expect("set");
        store.set(PAGE_KEY, "2").expect("set");

        let snapshot = LocalProgress::new(store).load();
        assert_eq!(snapshot.discovered, DiscoverySet::new());
        assert_eq!(snapshot.table.len(), 1);
        assert_eq!(snapshot.table[0].name.as_str(), "steam");
        assert_eq!(snapshot.page, 2);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().expect("create temp dir");
        let local = LocalProgress::new(FileStore::with_data_dir(dir.path()).expect("store"));

        let mut discovered = DiscoverySet::new();
        discovered.insert("steam".into());
        let mut table = Table::new();
        table.spawn("steam".into(), 10.0, 20.0);

        local.save_discovered(&discovered).expect("save discovered");
        local.save_table(&table).expect("save table");
        local.save_page(1).expect("save page");

        let reopened = LocalProgress::new(FileStore::with_data_dir(dir.path()).expect("store"));
        let snapshot = reopened.load();
        assert_eq!(snapshot.discovered, discovered);
        assert_eq!(snapshot.table, table.snapshot().0);
        assert_eq!(snapshot.page, 1);
        assert!(dir.path().join("alchemy_table.json").exists());
    }

    #[test]
    fn test_file_store_missing_key_is_none() {
        let dir = TempDir::new().expect("create temp dir");
        let store = FileStore::with_data_dir(dir.path().join("nested")).expect("store");
        assert!(store.get("absent").expect("get").is_none());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("prog_v2:ash:default"), "prog_v2_ash_default");
        assert_eq!(sanitize_filename("../etc"), "___etc");
    }
}

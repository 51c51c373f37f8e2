//! Per-user progress storage.
//!
//! Records are kept in memory and, when a data directory is configured,
//! written through to one JSON file per record. Files are read lazily on
//! first access, so restarts pick up earlier saves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use alchemy_core::store::sanitize_filename;
use alchemy_core::{ElementName, InitResponse, ProgressLimits, SaveRequest, StoreError, Token};
use serde::{Deserialize, Serialize};

/// Version prefix of every storage key.
pub const KEY_PREFIX: &str = "prog_v2";

/// One user's stored progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedProgress {
    /// Discovered names in discovery order.
    #[serde(default)]
    pub discovered: Vec<ElementName>,
    /// Most recent table tokens.
    #[serde(default)]
    pub elements: Vec<Token>,
}

impl From<SaveRequest> for SavedProgress {
    fn from(request: SaveRequest) -> Self {
        Self {
            discovered: request.discovered_names,
            elements: request.table_tokens,
        }
    }
}

impl SavedProgress {
    /// Convert to the init response for `username`.
    ///
    /// An empty stored table is reported as absent.
    #[must_use]
    pub fn into_init(self, username: Option<String>) -> InitResponse {
        InitResponse {
            discovered_names: self.discovered,
            table_tokens: (!self.elements.is_empty()).then_some(self.elements),
            username,
        }
    }
}

/// Result of a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The record was written.
    Stored {
        /// Serialized size in bytes.
        size: usize,
    },
    /// The serialized record exceeded the ceiling and nothing was written.
    TooLarge {
        /// Serialized size in bytes.
        size: usize,
    },
}

/// Thread-safe progress store keyed by user within one scope.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    records: Arc<RwLock<HashMap<String, SavedProgress>>>,
    data_dir: Option<PathBuf>,
    scope: String,
    limits: ProgressLimits,
}

impl ProgressStore {
    /// Create an in-memory store.
    #[must_use]
    pub fn new(scope: impl Into<String>, limits: ProgressLimits) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            data_dir: None,
            scope: scope.into(),
            limits,
        }
    }

    /// Create a store persisted under `data_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn with_data_dir(
        data_dir: impl Into<PathBuf>,
        scope: impl Into<String>,
        limits: ProgressLimits,
    ) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Progress store persisted in {}", data_dir.display());
        Ok(Self {
            data_dir: Some(data_dir),
            ..Self::new(scope, limits)
        })
    }

    /// Storage key of a user's record.
    #[must_use]
    pub fn key(&self, user: &str) -> String {
        format!("{KEY_PREFIX}:{user}:{}", self.scope)
    }

    /// The storage scope.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The caps applied on save.
    #[must_use]
    pub const fn limits(&self) -> &ProgressLimits {
        &self.limits
    }

    /// The data directory, if persistent.
    #[must_use]
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Whether the backing storage is usable.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        let dir_ok = match self.data_dir() {
            Some(dir) => dir.is_dir(),
            None => true,
        };
        !self.records.is_poisoned() && dir_ok
    }

    /// Number of records held in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Returns true if no record is held in memory.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a user's progress. Missing or malformed records are empty.
    #[must_use]
    pub fn load(&self, user: &str) -> SavedProgress {
        let key = self.key(user);
        {
            let records = self
                .records
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(progress) = records.get(&key) {
                return progress.clone();
            }
        }

        let Some(progress) = self.read_file(&key) else {
            tracing::debug!("No progress stored for {key}");
            return SavedProgress::default();
        };
        tracing::debug!(
            "Loaded {} discovered, {} tokens for {key}",
            progress.discovered.len(),
            progress.elements.len()
        );
        self.records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key, progress.clone());
        progress
    }

    /// Save a user's progress, keeping only the most recent tokens.
    ///
    /// Records above the byte ceiling are skipped, not truncated.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails. The
    /// in-memory record is left unchanged then.
    pub fn save(&self, user: &str, mut progress: SavedProgress) -> Result<SaveOutcome, StoreError> {
        let key = self.key(user);
        let excess = progress
            .elements
            .len()
            .saturating_sub(self.limits.max_table_tokens);
        progress.elements.drain(..excess);

        let body = serde_json::to_string(&progress)?;
        let size = body.len();
        if size > self.limits.max_payload_bytes {
            tracing::warn!(
                "Skipping save for {key}: {size} bytes exceeds {}",
                self.limits.max_payload_bytes
            );
            return Ok(SaveOutcome::TooLarge { size });
        }

        if let Some(path) = self.path_for(&key) {
            std::fs::write(&path, &body)?;
        }
        tracing::debug!(
            "Saved {} discovered, {} tokens for {key} ({size} bytes)",
            progress.discovered.len(),
            progress.elements.len()
        );
        self.records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key, progress);
        Ok(SaveOutcome::Stored { size })
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", sanitize_filename(key))))
    }

    fn read_file(&self, key: &str) -> Option<SavedProgress> {
        let path = self.path_for(key)?;
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(progress) => Some(progress),
            Err(e) => {
                tracing::warn!("Ignoring malformed record {}: {e}", path.display());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alchemy_core::TokenId;
    use tempfile::TempDir;

    fn tokens(count: usize) -> Vec<Token> {
        (1..=count)
            .map(|i| Token::new(TokenId::from(format!("el-{i}").as_str()), "fire".into(), 10.0, 10.0))
            .collect()
    }

    fn progress(names: &[&str], count: usize) -> SavedProgress {
        SavedProgress {
            discovered: names.iter().map(|&n| n.into()).collect(),
            elements: tokens(count),
        }
    }

    #[test]
    fn test_key_format() {
        let store = ProgressStore::new("default", ProgressLimits::default());
        assert_eq!(store.key("t2_ash"), "prog_v2:t2_ash:default");
    }

    #[test]
    fn test_missing_user_loads_empty() {
        let store = ProgressStore::new("default", ProgressLimits::default());
        assert_eq!(store.load("nobody"), SavedProgress::default());
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_keeps_last_twenty_tokens() {
        let store = ProgressStore::new("default", ProgressLimits::default());
        let outcome = store
            .save("ash", progress(&["air", "steam"], 25))
            .expect("save");
        assert!(matches!(outcome, SaveOutcome::Stored { .. }));

        let loaded = store.load("ash");
        assert_eq!(loaded.elements.len(), 20);
        assert_eq!(loaded.elements[0].id, TokenId::from("el-6"));
        assert_eq!(loaded.elements[19].id, TokenId::from("el-25"));
    }

    #[test]
    fn test_oversized_save_is_skipped() {
        let limits = ProgressLimits {
            max_payload_bytes: 64,
            ..ProgressLimits::default()
        };
        let store = ProgressStore::new("default", limits);
        store.save("ash", progress(&["air"], 0)).expect("small save");

        let outcome = store.save("ash", progress(&["air"], 5)).expect("save");
        assert!(matches!(outcome, SaveOutcome::TooLarge { .. }));
        assert!(store.load("ash").elements.is_empty());
    }

    #[test]
    fn test_users_and_scopes_are_isolated() {
        let dir = TempDir::new().expect("temp dir");
        let a = ProgressStore::with_data_dir(dir.path(), "sub-a", ProgressLimits::default())
            .expect("store");
        let b = ProgressStore::with_data_dir(dir.path(), "sub-b", ProgressLimits::default())
            .expect("store");

        a.save("ash", progress(&["steam"], 1)).expect("save");
        assert!(a.load("birch").discovered.is_empty());
        assert!(b.load("ash").discovered.is_empty());
    }

    #[test]
    fn test_persisted_records_survive_restart() {
        let dir = TempDir::new().expect("temp dir");
        {
            let store = ProgressStore::with_data_dir(dir.path(), "default", ProgressLimits::default())
                .expect("store");
            store.save("ash", progress(&["air", "steam"], 2)).expect("save");
        }

        let store = ProgressStore::with_data_dir(dir.path(), "default", ProgressLimits::default())
            .expect("store");
        assert!(store.is_empty());
        let loaded = store.load("ash");
        assert_eq!(loaded.discovered, vec![ElementName::from("air"), ElementName::from("steam")]);
        assert_eq!(loaded.elements.len(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.is_ready());
    }

    #[test]
    fn test_malformed_file_loads_empty() {
        let dir = TempDir::new().expect("temp dir");
        let store = ProgressStore::with_data_dir(dir.path(), "default", ProgressLimits::default())
            .expect("store");
        let path = dir
            .path()
            .join(format!("{}.json", sanitize_filename(&store.key("ash"))));
        std::fs::write(path, "{not json").expect("write");

        assert_eq!(store.load("ash"), SavedProgress::default());
    }

    #[test]
    fn test_into_init_omits_empty_table() {
        let init = progress(&["air"], 0).into_init(Some("ash".into()));
        assert!(init.table_tokens.is_none());
        assert_eq!(init.username.as_deref(), Some("ash"));

        let init = progress(&["air"], 1).into_init(None);
        assert_eq!(init.table_tokens.as_ref().map(Vec::len), Some(1));
    }
}

//! Best-effort persistence of grid view state
//!
//! State is stored as JSON under `<prefix>-state-<gridId>`. Failing to read
//! or write it never interrupts the grid: reads fall back to defaults and
//! write failures are logged and dropped.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::filter::FilterPredicate;
use crate::model::row_store::RowKey;
use crate::model::sort::SortState;

/// Bumped whenever the shape of [`PersistedState`] changes
pub const STATE_VERSION: u32 = 1;

/// Snapshot of the parts of a grid the user configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub version: u32,
    /// Field name to hidden flag
    #[serde(default)]
    pub columns: BTreeMap<String, bool>,
    #[serde(default)]
    pub filters: Vec<FilterPredicate>,
    #[serde(default)]
    pub sort: Option<SortState>,
    #[serde(default)]
    pub selected: Option<RowKey>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            columns: BTreeMap::new(),
            filters: Vec::new(),
            sort: None,
            selected: None,
        }
    }
}

/// Key-value slot storage, the equivalent of a browser's local storage
pub trait StateStorage: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// In-process storage; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.slots.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.slots.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl StateStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.slot_path(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        fs::write(self.slot_path(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.slot_path(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Reads and writes [`PersistedState`] through a [`StateStorage`]
pub struct PersistenceStore {
    storage: Box<dyn StateStorage>,
    prefix: String,
}

impl std::fmt::Debug for PersistenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl PersistenceStore {
    pub fn new(storage: Box<dyn StateStorage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    pub fn in_memory(prefix: impl Into<String>) -> Self {
        Self::new(Box::new(MemoryStorage::new()), prefix)
    }

    /// Storage key of a grid's state
    pub fn key_for(&self, grid_id: &str) -> String {
        format!("{}-state-{}", self.prefix, grid_id)
    }

    /// Serialize and store `state`; failures are logged, never returned
    pub fn save(&mut self, key: &str, state: &PersistedState) {
        if let Err(e) = self.try_save(key, state) {
            tracing::warn!(key, error = %e, "could not persist grid state");
        }
    }

    fn try_save(&mut self, key: &str, state: &PersistedState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.storage.set(key, &json)
    }

    /// Stored state for `key`
    ///
    /// Returns `None` when nothing is stored, the JSON does not parse, or the
    /// state was written by a different format version.
    pub fn load(&self, key: &str) -> Option<PersistedState> {
        let json = self.storage.get(key)?;
        let state: PersistedState = match serde_json::from_str(&json) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring unreadable grid state");
                return None;
            }
        };
        if state.version != STATE_VERSION {
            tracing::debug!(key, version = state.version, "ignoring grid state from another version");
            return None;
        }
        Some(state)
    }

    pub fn clear(&mut self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            tracing::warn!(key, error = %e, "could not clear grid state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridError;
    use crate::model::field::Comparator;
    use crate::model::sort::SortDirection;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct ReadOnlyStorage;

    impl StateStorage for ReadOnlyStorage {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&mut self, key: &str, _value: &str) -> Result<()> {
            Err(GridError::Storage(format!("storage is read-only, cannot write `{}`", key)))
        }

        fn remove(&mut self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    fn sample_state() -> PersistedState {
        let mut state = PersistedState::default();
        state.columns.insert("age".to_string(), true);
        state
            .filters
            .push(FilterPredicate::new("age", Comparator::IsGreaterThan, 26));
        state.sort = Some(SortState::new("name", SortDirection::Desc));
        state.selected = Some(RowKey::Id("2".to_string()));
        state
    }

    #[test]
    fn test_key_format() {
        let store = PersistenceStore::in_memory("app");
        assert_eq!(store.key_for("people"), "app-state-people");
    }

    #[test]
    fn test_load_missing_key_is_none() {
        let store = PersistenceStore::in_memory("app");
        assert!(store.load("app-state-never-written").is_none());
    }

    #[test]
    fn test_save_then_load() {
        let mut store = PersistenceStore::in_memory("app");
        let state = sample_state();
        store.save("k", &state);
        assert_eq!(store.load("k"), Some(state));

        store.clear("k");
        assert!(store.load("k").is_none());
    }

    #[test]
    fn test_unparseable_and_foreign_versions_are_ignored() {
        let mut storage = MemoryStorage::new();
        storage.set("broken", "{not json").unwrap();
        storage.set("old", r#"{"version": 0, "columns": {"age": true}}"#).unwrap();
        let store = PersistenceStore::new(Box::new(storage), "app");

        assert!(store.load("broken").is_none());
        assert!(store.load("old").is_none());
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let mut store = PersistenceStore::new(Box::new(ReadOnlyStorage), "app");
        store.save("k", &sample_state());
        assert!(store.load("k").is_none());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state"));
        let mut store = PersistenceStore::new(Box::new(storage), "app");
        let key = store.key_for("people/list");

        store.save(&key, &sample_state());
        assert!(dir.path().join("state").join("app-state-people_list.json").exists());
        assert_eq!(store.load(&key), Some(sample_state()));
    }
}

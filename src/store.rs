use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Value stored under the completion key once the mission is finished.
pub const COMPLETED_VALUE: &str = "true";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage is not available: {reason}")]
    Unavailable { reason: String },
    #[error("failed to access state file at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("state file at {path} is malformed: {source}")]
    Malformed {
        path: String,
        source: serde_json::Error,
    },
}

/// Minimal string key/value persistence.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Keeps entries as a flat JSON object on disk. Every write rewrites the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.display().to_string(),
                    source,
                });
            }
        };

        serde_json::from_slice(&data).map_err(|source| StoreError::Malformed {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let serialized =
            serde_json::to_vec_pretty(entries).map_err(|source| StoreError::Malformed {
                path: self.path.display().to_string(),
                source,
            })?;

        fs::write(&self.path, serialized).map_err(|source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

/// Persisted "mission already completed" flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionGate<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> CompletionGate<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Unreadable storage counts as "not completed".
    pub fn is_completed(&self) -> bool {
        match self.store.get(&self.key) {
            Ok(value) => value.as_deref() == Some(COMPLETED_VALUE),
            Err(error) => {
                tracing::warn!(key = %self.key, %error, "completion flag could not be read");
                false
            }
        }
    }

    pub fn mark_completed(&mut self) -> Result<(), StoreError> {
        self.store.set(&self.key, COMPLETED_VALUE)
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.store.remove(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "mission_completed";

    #[test]
    fn memory_store_round_trips_values() {
        let mut store = MemoryStore::new();
        store.set("a", "1").expect("memory writes succeed");

        assert_eq!(store.get("a").expect("memory reads succeed"), Some("1".to_string()));
        store.remove("a").expect("memory removes succeed");
        assert_eq!(store.get("a").expect("memory reads succeed"), None);
    }

    #[test]
    fn gate_starts_open() {
        let gate = CompletionGate::new(MemoryStore::new(), KEY);
        assert!(!gate.is_completed());
    }

    #[test]
    fn gate_closes_after_completion_and_reopens_on_clear() {
        let mut gate = CompletionGate::new(MemoryStore::new(), KEY);
        gate.mark_completed().expect("memory writes succeed");

        assert!(gate.is_completed());
        assert_eq!(
            gate.store().get(KEY).expect("memory reads succeed").as_deref(),
            Some(COMPLETED_VALUE)
        );

        gate.clear().expect("memory removes succeed");
        assert!(!gate.is_completed());
    }

    #[test]
    fn only_the_literal_true_counts() {
        let mut store = MemoryStore::new();
        store.set(KEY, "yes").expect("memory writes succeed");

        assert!(!CompletionGate::new(store, KEY).is_completed());
    }

    #[test]
    fn file_store_treats_missing_file_as_empty() {
        let root = tempfile::tempdir().expect("temporary directory should be created");
        let store = FileStore::new(root.path().join("state.json"));

        assert_eq!(store.get(KEY).expect("missing file reads as empty"), None);
    }

    #[test]
    fn file_store_persists_between_instances() {
        let root = tempfile::tempdir().expect("temporary directory should be created");
        let path = root.path().join("state.json");

        let mut first = FileStore::new(&path);
        first.set(KEY, COMPLETED_VALUE).expect("file write succeeds");
        first.set("other", "kept").expect("file write succeeds");

        let mut second = FileStore::new(&path);
        assert_eq!(second.path(), path.as_path());
        assert_eq!(
            second.get(KEY).expect("file read succeeds").as_deref(),
            Some(COMPLETED_VALUE)
        );

        second.remove(KEY).expect("file remove succeeds");
        assert_eq!(first.get(KEY).expect("file read succeeds"), None);
        assert_eq!(
            first.get("other").expect("file read succeeds").as_deref(),
            Some("kept")
        );
    }

    #[test]
    fn malformed_file_is_reported_and_gate_stays_open() {
        let root = tempfile::tempdir().expect("temporary directory should be created");
        let path = root.path().join("state.json");
        fs::write(&path, "not json").expect("fixture should be written");

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get(KEY),
            Err(StoreError::Malformed { .. })
        ));
        assert!(!CompletionGate::new(store, KEY).is_completed());
    }
}

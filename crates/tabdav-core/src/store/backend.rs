//! Storage backends for the local data store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{Error, Result};

/// Platform key-value storage the local data store persists through.
///
/// Writes must be atomic per key; keys are independent of each other.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Value>>;
    async fn write(&self, key: &str, value: Value) -> Result<()>;
}

/// Volatile backend for tests and in-process composition.
#[derive(Default)]
pub struct MemoryBackend {
    cells: Mutex<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.cells.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<()> {
        self.cells.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Backend persisting the whole key space as one JSON document on disk.
///
/// Used by host processes without platform extension storage (CLI).
pub struct FileBackend {
    path: PathBuf,
    cells: Mutex<HashMap<String, Value>>,
}

impl FileBackend {
    /// Open (or create) the backing file and load its current contents.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cells = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|error| {
                Error::Storage(format!(
                    "corrupt store file {}: {error}",
                    path.display()
                ))
            })?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            cells: Mutex::new(cells),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, cells: &HashMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(cells)?;
        std::fs::write(&self.path, serialized)?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.cells.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<()> {
        let mut cells = self.cells.lock().await;
        cells.insert(key.to_string(), value);
        self.flush(&cells)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn memory_backend_round_trips_values() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.read("missing").await.unwrap(), None);

        backend.write("k", json!({"a": 1})).await.unwrap();
        assert_eq!(backend.read("k").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn file_backend_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let backend = FileBackend::open(&path).unwrap();
            backend.write("notes", json!("remember")).await.unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(
            backend.read("notes").await.unwrap(),
            Some(json!("remember"))
        );
    }

    #[tokio::test]
    async fn file_backend_rejects_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json at all").unwrap();

        assert!(matches!(FileBackend::open(&path), Err(Error::Storage(_))));
    }
}

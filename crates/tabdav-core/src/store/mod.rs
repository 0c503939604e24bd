//! Local data store with offline mirror and change notifications.
//!
//! Wraps a [`StorageBackend`] with the behavior the sync engine relies
//! on: every successfully observed value is kept in an in-memory mirror
//! that is itself persisted, so a transiently unreachable backend still
//! serves the most recently seen value instead of a default. Every
//! mutation is published on a broadcast stream keyed by logical field.

pub mod backend;
pub mod keys;

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::config::WebDavConfig;
use crate::models::{search_engine, AppDataset, BookmarkNode, SearchEngine, Shortcut, Todo};
use crate::Result;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A mutation observed on one logical storage key.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Key-value store over a storage backend, with an offline mirror and
/// a change-notification stream.
pub struct LocalDataStore {
    backend: Arc<dyn StorageBackend>,
    mirror: RwLock<HashMap<String, Value>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl LocalDataStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let (events, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            backend,
            mirror: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Load the persisted offline mirror. Failures leave the mirror
    /// empty; the store stays usable against the primary backend.
    pub async fn load_offline_mirror(&self) {
        match self.backend.read(keys::OFFLINE_MIRROR).await {
            Ok(Some(Value::Object(entries))) => {
                let mut mirror = self.mirror.write().await;
                for (key, value) in entries {
                    mirror.insert(key, value);
                }
            }
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(%error, "failed to load offline mirror, starting empty");
            }
        }
    }

    /// Subscribe to mutation events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Publish a mutation observed outside this store instance
    /// (e.g. another execution context of the same host).
    pub fn publish_change(&self, event: ChangeEvent) {
        let _ = self.events.send(event);
    }

    /// Read a value, falling back to the offline mirror when the
    /// backend has no value or is unreachable.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        match self.backend.read(key).await {
            Ok(Some(value)) => {
                self.remember(key, value.clone()).await;
                Ok(Some(value))
            }
            Ok(None) => Ok(self.mirror.read().await.get(key).cloned()),
            Err(error) => {
                if let Some(cached) = self.mirror.read().await.get(key).cloned() {
                    tracing::warn!(%error, key, "primary storage unavailable, serving offline mirror");
                    Ok(Some(cached))
                } else {
                    Err(error)
                }
            }
        }
    }

    /// Read a value, substituting `default` when nothing is stored
    /// anywhere or the read fails outright.
    pub async fn get_or(&self, key: &str, default: Value) -> Value {
        match self.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(error) => {
                tracing::warn!(%error, key, "read failed, substituting default");
                default
            }
        }
    }

    /// Write a value. Atomic per key; independent keys do not block
    /// each other beyond the backend's own serialization.
    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.backend.write(key, value.clone()).await?;
        let old_value = self.remember(key, value.clone()).await;
        let _ = self.events.send(ChangeEvent {
            key: key.to_string(),
            old_value,
            new_value: Some(value),
        });
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set(key, serde_json::to_value(value)?).await
    }

    /// Timestamp of the last aligned upload or pull, if any.
    pub async fn last_sync_timestamp(&self) -> Result<Option<i64>> {
        self.get_json(keys::SYNC_LAST_TIMESTAMP).await
    }

    pub async fn set_last_sync_timestamp(&self, timestamp: i64) -> Result<()> {
        self.set_json(keys::SYNC_LAST_TIMESTAMP, &timestamp).await
    }

    pub async fn webdav_config(&self) -> Result<Option<WebDavConfig>> {
        self.get_json(keys::WEBDAV_CONFIG).await
    }

    pub async fn set_webdav_config(&self, config: &WebDavConfig) -> Result<()> {
        self.set_json(keys::WEBDAV_CONFIG, config).await
    }

    /// Assemble the full dataset, substituting defaults for absent
    /// categories so an encoded snapshot never silently drops a field.
    pub async fn collect_dataset(&self) -> Result<AppDataset> {
        let shortcuts: Vec<Shortcut> = self.get_json(keys::SHORTCUTS).await?.unwrap_or_default();
        let settings: Map<String, Value> = self.get_json(keys::SETTINGS).await?.unwrap_or_default();
        let engines: BTreeMap<String, SearchEngine> =
            self.get_json(keys::SEARCH_ENGINES).await?.unwrap_or_default();
        let todos: Vec<Todo> = self.get_json(keys::TODOS).await?.unwrap_or_default();
        let notes: String = self.get_json(keys::NOTES).await?.unwrap_or_default();
        let webdav_config = self.webdav_config().await?;
        let bookmarks: Vec<BookmarkNode> =
            self.get_json(keys::USER_BOOKMARKS).await?.unwrap_or_default();

        Ok(AppDataset {
            shortcuts,
            settings,
            search_engines: search_engine::with_builtin_defaults(engines),
            todos,
            notes,
            webdav_config,
            bookmarks,
        })
    }

    /// Overwrite every local category from a decoded dataset.
    ///
    /// The caller is expected to have fully decoded and validated the
    /// dataset first; this never partially applies a malformed snapshot.
    pub async fn apply_dataset(&self, dataset: &AppDataset) -> Result<()> {
        self.set_json(keys::SHORTCUTS, &dataset.shortcuts).await?;
        self.set_json(keys::SETTINGS, &dataset.settings).await?;
        self.set_json(keys::SEARCH_ENGINES, &dataset.search_engines)
            .await?;
        self.set_json(keys::TODOS, &dataset.todos).await?;
        self.set_json(keys::NOTES, &dataset.notes).await?;
        if let Some(config) = &dataset.webdav_config {
            self.set_webdav_config(config).await?;
        }
        self.set_json(keys::USER_BOOKMARKS, &dataset.bookmarks).await
    }

    /// Record an observed value in the mirror and persist the mirror.
    /// The mirror key itself is never mirrored.
    async fn remember(&self, key: &str, value: Value) -> Option<Value> {
        if key == keys::OFFLINE_MIRROR {
            return None;
        }
        let old_value = {
            let mut mirror = self.mirror.write().await;
            mirror.insert(key.to_string(), value)
        };
        self.persist_mirror().await;
        old_value
    }

    async fn persist_mirror(&self) {
        let snapshot = self.mirror.read().await.clone();
        match serde_json::to_value(snapshot) {
            Ok(serialized) => {
                if let Err(error) = self.backend.write(keys::OFFLINE_MIRROR, serialized).await {
                    tracing::warn!(%error, "failed to persist offline mirror");
                }
            }
            Err(error) => tracing::warn!(%error, "failed to serialize offline mirror"),
        }
    }
}

/// Fold edits made by other processes of the same store file into this
/// store.
///
/// [`FileBackend`] loads its document once at open, so a concurrent
/// invocation writing the same file is invisible to an already-running
/// host. The spawned task re-reads the file every `interval` and writes
/// each changed key back through the store, which refreshes the backend
/// and fires the usual change events for subscribers. The offline
/// mirror key is never folded; an unreadable or corrupt file skips the
/// tick.
pub fn watch_store_file(
    store: Arc<LocalDataStore>,
    path: PathBuf,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = read_store_document(&path).unwrap_or_default();
        loop {
            tokio::time::sleep(interval).await;
            let Some(current) = read_store_document(&path) else {
                continue;
            };
            if current == last {
                continue;
            }
            for (key, value) in &current {
                if key == keys::OFFLINE_MIRROR || last.get(key) == Some(value) {
                    continue;
                }
                if let Err(error) = store.set(key, value.clone()).await {
                    tracing::warn!(%error, key, "failed to fold external change into store");
                }
            }
            last = current;
        }
    })
}

fn read_store_document(path: &Path) -> Option<HashMap<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::Error;

    use super::*;

    /// Backend whose reads and writes can be switched off to simulate
    /// transient platform storage outages.
    struct FlakyBackend {
        inner: MemoryBackend,
        offline: AtomicBool,
    }

    impl FlakyBackend {
        fn new() -> Self {
            Self {
                inner: MemoryBackend::new(),
                offline: AtomicBool::new(false),
            }
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl StorageBackend for FlakyBackend {
        async fn read(&self, key: &str) -> Result<Option<Value>> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::Storage("backend offline".to_string()));
            }
            self.inner.read(key).await
        }

        async fn write(&self, key: &str, value: Value) -> Result<()> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::Storage("backend offline".to_string()));
            }
            self.inner.write(key, value).await
        }
    }

    fn store_over(backend: Arc<dyn StorageBackend>) -> LocalDataStore {
        LocalDataStore::new(backend)
    }

    #[tokio::test]
    async fn get_or_returns_default_for_missing_key() {
        let store = store_over(Arc::new(MemoryBackend::new()));
        assert_eq!(store.get_or("missing", json!(42)).await, json!(42));
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = store_over(Arc::new(MemoryBackend::new()));
        store.set(keys::NOTES, json!("hello")).await.unwrap();
        assert_eq!(store.get(keys::NOTES).await.unwrap(), Some(json!("hello")));
    }

    #[tokio::test]
    async fn mirror_serves_last_observed_value_when_backend_fails() {
        let backend = Arc::new(FlakyBackend::new());
        let store = store_over(backend.clone());

        store.set(keys::NOTES, json!("cached")).await.unwrap();
        backend.set_offline(true);

        assert_eq!(store.get(keys::NOTES).await.unwrap(), Some(json!("cached")));
        // A key never observed has nothing to fall back on.
        assert!(store.get(keys::TODOS).await.is_err());
    }

    #[tokio::test]
    async fn mirror_survives_store_restart() {
        let backend = Arc::new(FlakyBackend::new());
        {
            let store = store_over(backend.clone());
            store.set(keys::NOTES, json!("persisted")).await.unwrap();
        }

        // New store instance over the same backend; only the mirror key
        // is readable.
        let store = store_over(backend.clone());
        store.load_offline_mirror().await;
        backend.set_offline(true);
        assert_eq!(
            store.get(keys::NOTES).await.unwrap(),
            Some(json!("persisted"))
        );
    }

    #[tokio::test]
    async fn set_publishes_change_event_with_old_and_new_value() {
        let store = store_over(Arc::new(MemoryBackend::new()));
        let mut events = store.subscribe();

        store.set(keys::NOTES, json!("first")).await.unwrap();
        store.set(keys::NOTES, json!("second")).await.unwrap();

        let first = events.recv().await.unwrap();
        assert_eq!(first.key, keys::NOTES);
        assert_eq!(first.old_value, None);
        assert_eq!(first.new_value, Some(json!("first")));

        let second = events.recv().await.unwrap();
        assert_eq!(second.old_value, Some(json!("first")));
        assert_eq!(second.new_value, Some(json!("second")));
    }

    #[tokio::test]
    async fn publish_change_forwards_external_mutations() {
        let store = store_over(Arc::new(MemoryBackend::new()));
        let mut events = store.subscribe();

        store.publish_change(ChangeEvent {
            key: keys::SHORTCUTS.to_string(),
            old_value: None,
            new_value: Some(json!([])),
        });

        let event = events.recv().await.unwrap();
        assert_eq!(event.key, keys::SHORTCUTS);
    }

    #[tokio::test(start_paused = true)]
    async fn store_file_poller_folds_external_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let seed = FileBackend::open(&path).unwrap();
            seed.write(keys::NOTES, json!("original")).await.unwrap();
        }

        let store = Arc::new(LocalDataStore::new(Arc::new(FileBackend::open(&path).unwrap())));
        let mut events = store.subscribe();
        let poller = watch_store_file(store.clone(), path.clone(), Duration::from_millis(20));
        tokio::task::yield_now().await;

        // A second invocation rewrites the same file.
        {
            let other = FileBackend::open(&path).unwrap();
            other
                .write(keys::NOTES, json!("edited elsewhere"))
                .await
                .unwrap();
        }

        tokio::time::advance(Duration::from_millis(25)).await;

        let event = events.recv().await.unwrap();
        assert_eq!(event.key, keys::NOTES);
        assert_eq!(event.new_value, Some(json!("edited elsewhere")));
        // The backend itself was refreshed, not just the event stream.
        assert_eq!(
            store.get(keys::NOTES).await.unwrap(),
            Some(json!("edited elsewhere"))
        );
        poller.abort();
    }

    #[tokio::test]
    async fn collect_dataset_fills_defaults_and_builtin_engines() {
        let store = store_over(Arc::new(MemoryBackend::new()));
        let dataset = store.collect_dataset().await.unwrap();

        assert!(dataset.shortcuts.is_empty());
        assert!(dataset.notes.is_empty());
        assert!(dataset.search_engines.contains_key("google"));
        assert!(dataset.search_engines.contains_key("duckduckgo"));
    }

    #[tokio::test]
    async fn apply_then_collect_round_trips_dataset() {
        let store = store_over(Arc::new(MemoryBackend::new()));

        let mut dataset = AppDataset {
            shortcuts: vec![Shortcut::new("Example", "https://example.com")],
            todos: vec![Todo::new("water the plants")],
            notes: "scratchpad".to_string(),
            bookmarks: vec![BookmarkNode::link("News", "https://news.example.com")],
            ..AppDataset::default()
        };
        dataset.settings.insert("theme".to_string(), json!("dark"));

        store.apply_dataset(&dataset).await.unwrap();
        let collected = store.collect_dataset().await.unwrap();

        assert_eq!(collected.shortcuts, dataset.shortcuts);
        assert_eq!(collected.todos, dataset.todos);
        assert_eq!(collected.notes, dataset.notes);
        assert_eq!(collected.settings, dataset.settings);
        assert_eq!(collected.bookmarks, dataset.bookmarks);
        // Built-ins are guaranteed present even though apply wrote none.
        assert!(collected.search_engines.contains_key("bing"));
    }
}

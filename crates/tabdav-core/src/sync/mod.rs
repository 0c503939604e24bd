//! Sync engine: orchestrates startup reconciliation, debounced
//! uploads, downloads and conflict resolution.
//!
//! The engine never retries on its own. A failed upload leaves the
//! last-sync timestamp untouched, so the next startup check or the
//! next debounce cycle attempts again; a failed startup check leaves
//! the application running against local-only data.

pub mod backup;
pub mod merge;

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::remote::RemoteStore;
use crate::snapshot::{self, REMOTE_DIR};
use crate::store::{keys, LocalDataStore};
use crate::util::unix_timestamp_millis;
use crate::{Error, Result};

pub use merge::{merge_datasets, ConflictResolution};

/// Quiet period after the last qualifying mutation before an upload.
pub const DEBOUNCE_QUIET_PERIOD: Duration = Duration::from_secs(3);

/// Extended timeout for snapshot transfers, in milliseconds.
pub const SNAPSHOT_TIMEOUT_MS: u64 = 15_000;

/// Where the engine currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    CheckingOnStartup,
    AwaitingConflictResolution,
    Uploading,
    Downloading,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub filename: String,
    pub timestamp: i64,
}

/// Result of a successful download. The caller must reload any UI
/// derived from the dataset; the engine only requests that effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub filename: String,
    pub timestamp: i64,
}

/// What the startup check decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// No sync snapshot exists remotely; nothing to reconcile.
    NoRemoteData,
    /// Local and cloud timestamps match.
    UpToDate,
    /// A strictly newer (or first) cloud snapshot was adopted.
    Downloaded(DownloadReport),
    /// Cloud is behind local; a human decision is required.
    Conflict {
        cloud_filename: String,
        local_timestamp: i64,
        cloud_timestamp: i64,
    },
}

/// How a pending conflict was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    LocalPushed(UploadReport),
    RemoteAdopted(DownloadReport),
    /// Merged dataset is both the new local state and the new snapshot.
    Merged(UploadReport),
}

/// The orchestration core tying the local store to a remote store.
pub struct SyncEngine {
    store: Arc<LocalDataStore>,
    remote: Arc<dyn RemoteStore>,
    phase: StdMutex<SyncPhase>,
    pending_conflict: StdMutex<Option<String>>,
    quiet_period: Duration,
    debounce: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine").finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(store: Arc<LocalDataStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            remote,
            phase: StdMutex::new(SyncPhase::Idle),
            pending_conflict: StdMutex::new(None),
            quiet_period: DEBOUNCE_QUIET_PERIOD,
            debounce: Mutex::new(None),
        }
    }

    /// Override the debounce quiet period.
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    pub fn phase(&self) -> SyncPhase {
        *lock_unpoisoned(&self.phase)
    }

    pub fn store(&self) -> &LocalDataStore {
        &self.store
    }

    pub(crate) fn remote(&self) -> &dyn RemoteStore {
        self.remote.as_ref()
    }

    /// Filename of the cloud snapshot a pending conflict refers to.
    pub fn pending_conflict(&self) -> Option<String> {
        lock_unpoisoned(&self.pending_conflict).clone()
    }

    fn set_phase(&self, phase: SyncPhase) {
        *lock_unpoisoned(&self.phase) = phase;
    }

    /// Reconcile local state against the newest remote snapshot.
    pub async fn startup_check(&self) -> Result<StartupOutcome> {
        self.set_phase(SyncPhase::CheckingOnStartup);
        let result = self.startup_inner().await;
        match &result {
            Ok(StartupOutcome::Conflict { .. }) => {}
            _ => self.set_phase(SyncPhase::Idle),
        }
        result
    }

    async fn startup_inner(&self) -> Result<StartupOutcome> {
        let local_timestamp = self.store.last_sync_timestamp().await?;
        let Some((cloud_filename, cloud_timestamp)) = self.latest_sync_snapshot().await? else {
            return Ok(StartupOutcome::NoRemoteData);
        };

        match local_timestamp {
            None => Ok(StartupOutcome::Downloaded(
                self.download_and_apply(&cloud_filename).await?,
            )),
            Some(local) if cloud_timestamp > local => Ok(StartupOutcome::Downloaded(
                self.download_and_apply(&cloud_filename).await?,
            )),
            Some(local) if cloud_timestamp == local => Ok(StartupOutcome::UpToDate),
            Some(local) => {
                // Stale cloud: surfaced as a conflict rather than
                // silently re-uploading over it.
                *lock_unpoisoned(&self.pending_conflict) = Some(cloud_filename.clone());
                self.set_phase(SyncPhase::AwaitingConflictResolution);
                Ok(StartupOutcome::Conflict {
                    cloud_filename,
                    local_timestamp: local,
                    cloud_timestamp,
                })
            }
        }
    }

    /// Newest remote sync snapshot as `(filename, timestamp)`.
    ///
    /// Selection is by lexicographically greatest name; stamp widths
    /// make that agree with chronological order. A missing remote
    /// directory reads as "no snapshots".
    pub async fn latest_sync_snapshot(&self) -> Result<Option<(String, i64)>> {
        let entries = match self.remote.list_directory(REMOTE_DIR).await {
            Ok(entries) => entries,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(error) => return Err(error),
        };
        Ok(entries
            .into_iter()
            .filter(|entry| !entry.is_directory && snapshot::is_sync_snapshot(&entry.name))
            .map(|entry| entry.name)
            .max()
            .and_then(|name| snapshot::extract_timestamp(&name).map(|ts| (name, ts))))
    }

    /// Push the full local dataset as a new snapshot, then prune every
    /// older sync snapshot (retain-one-newest).
    pub async fn upload_now(&self) -> Result<UploadReport> {
        self.set_phase(SyncPhase::Uploading);
        let result = self.upload_inner().await;
        self.set_phase(SyncPhase::Idle);
        result
    }

    async fn upload_inner(&self) -> Result<UploadReport> {
        let dataset = self.store.collect_dataset().await?;
        let timestamp = unix_timestamp_millis();
        let encoded = snapshot::encode(&dataset, timestamp)?;

        self.remote.create_directory(REMOTE_DIR).await?;
        self.remote
            .put_file_with_timeout(
                &snapshot::remote_path(&encoded.filename),
                &encoded.body,
                SNAPSHOT_TIMEOUT_MS,
            )
            .await?;
        self.store.set_last_sync_timestamp(timestamp).await?;

        // Pruning is best-effort; a leftover old snapshot is harmless
        // and will be removed by the next successful upload.
        if let Err(error) = self.prune_old_snapshots(&encoded.filename).await {
            tracing::warn!(%error, "failed to prune old sync snapshots");
        }

        tracing::info!(filename = %encoded.filename, "uploaded sync snapshot");
        Ok(UploadReport {
            filename: encoded.filename,
            timestamp,
        })
    }

    /// Delete every remote sync snapshot except `keep`. Manual backups
    /// are never touched.
    async fn prune_old_snapshots(&self, keep: &str) -> Result<()> {
        let entries = self.remote.list_directory(REMOTE_DIR).await?;
        for entry in entries {
            if entry.is_directory || entry.name == keep || !snapshot::is_sync_snapshot(&entry.name)
            {
                continue;
            }
            if let Err(error) = self.remote.delete_file(&snapshot::remote_path(&entry.name)).await
            {
                tracing::warn!(%error, filename = %entry.name, "failed to delete old snapshot");
            }
        }
        Ok(())
    }

    /// Fetch, decode and apply a named snapshot, then record its
    /// timestamp. Decoding happens before any local write, so a
    /// malformed body never partially applies.
    pub async fn download_and_apply(&self, filename: &str) -> Result<DownloadReport> {
        self.set_phase(SyncPhase::Downloading);
        let result = self.download_inner(filename).await;
        self.set_phase(SyncPhase::Idle);
        result
    }

    async fn download_inner(&self, filename: &str) -> Result<DownloadReport> {
        let timestamp = snapshot::extract_timestamp(filename).ok_or_else(|| {
            Error::ParseFailed(format!("no timestamp in snapshot name: {filename}"))
        })?;
        let body = self
            .remote
            .get_file_with_timeout(&snapshot::remote_path(filename), SNAPSHOT_TIMEOUT_MS)
            .await?;
        let dataset = snapshot::decode(&body)?;

        self.store.apply_dataset(&dataset).await?;
        self.store.set_last_sync_timestamp(timestamp).await?;

        tracing::info!(%filename, "applied remote snapshot");
        Ok(DownloadReport {
            filename: filename.to_string(),
            timestamp,
        })
    }

    /// Settle a pending conflict. On failure the conflict stays
    /// pending so the caller can retry with the same or another
    /// resolution.
    pub async fn resolve_conflict(
        &self,
        resolution: ConflictResolution,
    ) -> Result<ResolutionOutcome> {
        let cloud_filename = self
            .pending_conflict()
            .ok_or_else(|| Error::Unknown("no conflict awaiting resolution".to_string()))?;

        let outcome = match resolution {
            ConflictResolution::KeepLocal => {
                self.upload_now().await.map(ResolutionOutcome::LocalPushed)
            }
            ConflictResolution::KeepRemote => self
                .download_and_apply(&cloud_filename)
                .await
                .map(ResolutionOutcome::RemoteAdopted),
            ConflictResolution::Merge => self
                .merge_and_push(&cloud_filename)
                .await
                .map(ResolutionOutcome::Merged),
        };

        match outcome {
            Ok(outcome) => {
                *lock_unpoisoned(&self.pending_conflict) = None;
                Ok(outcome)
            }
            Err(error) => {
                self.set_phase(SyncPhase::AwaitingConflictResolution);
                Err(error)
            }
        }
    }

    async fn merge_and_push(&self, cloud_filename: &str) -> Result<UploadReport> {
        let body = self
            .remote
            .get_file_with_timeout(&snapshot::remote_path(cloud_filename), SNAPSHOT_TIMEOUT_MS)
            .await?;
        let cloud = snapshot::decode(&body)?;
        let local = self.store.collect_dataset().await?;

        let merged = merge_datasets(&cloud, &local);
        self.store.apply_dataset(&merged).await?;
        self.upload_now().await
    }

    /// Schedule a trailing-edge debounced upload: each call resets the
    /// timer, so a burst of calls yields one upload after the quiet
    /// period. Failures are logged, never surfaced.
    pub async fn schedule_upload(self: &Arc<Self>) {
        let mut slot = self.debounce.lock().await;
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let engine = Arc::clone(self);
        let quiet_period = self.quiet_period;
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            if let Err(error) = engine.upload_now().await {
                tracing::warn!(%error, "debounced upload failed, will retry on next trigger");
            }
        }));
    }

    /// Subscribe to the store's change stream and schedule a debounced
    /// upload for every mutation of a syncable key.
    pub fn watch_changes(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut events = self.store.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if keys::is_syncable(&event.key) {
                            engine.schedule_upload().await;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Missed events still imply local mutations.
                        tracing::warn!(skipped, "change stream lagged, scheduling upload");
                        engine.schedule_upload().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Poisoned locks only witness a panicked holder; the guarded values
/// here are plain flags, safe to keep using.
fn lock_unpoisoned<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

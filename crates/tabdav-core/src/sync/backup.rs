//! Manual backups.
//!
//! Backups live next to sync snapshots under the same remote
//! directory but use their own filename prefix and are exempt from
//! the retain-one-newest pruning. Restoring a backup applies its
//! dataset without touching the last-sync timestamp, so the next
//! startup check still reconciles against the newest sync snapshot.

use crate::snapshot::{self, REMOTE_DIR};
use crate::sync::{SyncEngine, UploadReport, SNAPSHOT_TIMEOUT_MS};
use crate::util::unix_timestamp_millis;
use crate::{Error, Result};

/// A remote backup file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub filename: String,
    pub timestamp: i64,
    pub size: u64,
}

impl SyncEngine {
    /// Push the current dataset as a manual backup.
    pub async fn create_backup(&self) -> Result<UploadReport> {
        let dataset = self.store().collect_dataset().await?;
        let timestamp = unix_timestamp_millis();
        let filename = snapshot::backup_filename(timestamp);
        let body = serde_json::to_string_pretty(&dataset)?;

        self.remote().create_directory(REMOTE_DIR).await?;
        self.remote()
            .put_file_with_timeout(&snapshot::remote_path(&filename), &body, SNAPSHOT_TIMEOUT_MS)
            .await?;

        tracing::info!(%filename, "created backup");
        Ok(UploadReport {
            filename,
            timestamp,
        })
    }

    /// All remote backups, newest first.
    pub async fn list_backups(&self) -> Result<Vec<BackupEntry>> {
        let entries = match self.remote().list_directory(REMOTE_DIR).await {
            Ok(entries) => entries,
            Err(Error::NotFound(_)) => return Ok(Vec::new()),
            Err(error) => return Err(error),
        };
        let mut backups: Vec<BackupEntry> = entries
            .into_iter()
            .filter(|entry| !entry.is_directory)
            .filter_map(|entry| {
                if !snapshot::is_backup_file(&entry.name) {
                    return None;
                }
                let timestamp = snapshot::extract_timestamp(&entry.name)?;
                Some(BackupEntry {
                    filename: entry.name,
                    timestamp,
                    size: entry.size,
                })
            })
            .collect();
        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(backups)
    }

    /// Fetch and apply a named backup. The last-sync timestamp is left
    /// alone.
    pub async fn restore_backup(&self, filename: &str) -> Result<()> {
        if !snapshot::is_backup_file(filename) {
            return Err(Error::Unknown(format!("not a backup file: {filename}")));
        }
        let body = self
            .remote()
            .get_file_with_timeout(&snapshot::remote_path(filename), SNAPSHOT_TIMEOUT_MS)
            .await?;
        let dataset = snapshot::decode(&body)?;
        self.store().apply_dataset(&dataset).await?;
        tracing::info!(%filename, "restored backup");
        Ok(())
    }

    /// Delete a named backup.
    pub async fn delete_backup(&self, filename: &str) -> Result<()> {
        if !snapshot::is_backup_file(filename) {
            return Err(Error::Unknown(format!("not a backup file: {filename}")));
        }
        self.remote()
            .delete_file(&snapshot::remote_path(filename))
            .await
    }
}

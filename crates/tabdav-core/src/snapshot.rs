//! Snapshot naming and codec.
//!
//! A snapshot is one JSON document carrying the full dataset, stored
//! remotely under `AndyTab/` as
//! `bookmarks_sync_<YYYY-MM-DD>_<unix-millis>.json`. The embedded
//! millisecond timestamp in the filename is the sole ordering key;
//! the date part exists for humans browsing the share. Manual backups
//! use the `bookmarks_backup` prefix and the same stamp layout.

use std::sync::LazyLock;

use chrono::{TimeZone, Utc};
use regex::Regex;

use crate::models::AppDataset;
use crate::{Error, Result};

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_-](\d+)\.json$").unwrap());

/// Remote directory all snapshots live in.
pub const REMOTE_DIR: &str = "AndyTab";

pub const SYNC_PREFIX: &str = "bookmarks_sync";
pub const BACKUP_PREFIX: &str = "bookmarks_backup";

/// An encoded snapshot ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub filename: String,
    pub body: String,
}

/// Encode the dataset as a snapshot stamped with `timestamp_millis`.
pub fn encode(dataset: &AppDataset, timestamp_millis: i64) -> Result<Snapshot> {
    Ok(Snapshot {
        filename: sync_filename(timestamp_millis),
        body: serde_json::to_string_pretty(dataset)?,
    })
}

/// Decode a snapshot body. Nothing is applied anywhere on failure.
pub fn decode(body: &str) -> Result<AppDataset> {
    serde_json::from_str(body).map_err(|error| Error::ParseFailed(error.to_string()))
}

pub fn sync_filename(timestamp_millis: i64) -> String {
    stamped_filename(SYNC_PREFIX, timestamp_millis)
}

pub fn backup_filename(timestamp_millis: i64) -> String {
    stamped_filename(BACKUP_PREFIX, timestamp_millis)
}

fn stamped_filename(prefix: &str, timestamp_millis: i64) -> String {
    let date = match Utc.timestamp_millis_opt(timestamp_millis).single() {
        Some(moment) => moment.format("%Y-%m-%d").to_string(),
        None => "1970-01-01".to_string(),
    };
    format!("{prefix}_{date}_{timestamp_millis}.json")
}

/// Remote path for a snapshot filename.
pub fn remote_path(filename: &str) -> String {
    format!("{REMOTE_DIR}/{filename}")
}

/// Pull the millisecond timestamp out of a snapshot filename.
///
/// Matches the final `_<digits>.json` or `-<digits>.json` segment;
/// anything else yields `None`.
pub fn extract_timestamp(filename: &str) -> Option<i64> {
    TIMESTAMP_RE
        .captures(filename)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Whether a filename is an automatic sync snapshot eligible for
/// ordering and pruning.
pub fn is_sync_snapshot(filename: &str) -> bool {
    filename.starts_with(SYNC_PREFIX) && extract_timestamp(filename).is_some()
}

/// Whether a filename is a manual backup. Backups are never pruned.
pub fn is_backup_file(filename: &str) -> bool {
    filename.starts_with(BACKUP_PREFIX) && extract_timestamp(filename).is_some()
}

//! Cloud-biased dataset merge.

use std::collections::HashSet;
use std::hash::Hash;

use crate::models::AppDataset;

/// The three resolutions a caller may pick for a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Push the local dataset, ignoring cloud content entirely.
    KeepLocal,
    /// Adopt the cloud snapshot, overwriting local data.
    KeepRemote,
    /// Cloud-biased union of both datasets, then push the result.
    Merge,
}

/// Deterministic cloud-biased merge.
///
/// List fields become a keyed union, cloud entries first and winning
/// on key collision. Map fields merge key-wise with the cloud value
/// winning. Notes follow the cloud when non-empty. The bookmark tree
/// is adopted wholesale from the cloud; the connection configuration
/// stays local.
pub fn merge_datasets(cloud: &AppDataset, local: &AppDataset) -> AppDataset {
    let mut settings = local.settings.clone();
    for (key, value) in &cloud.settings {
        settings.insert(key.clone(), value.clone());
    }

    let mut search_engines = local.search_engines.clone();
    for (key, engine) in &cloud.search_engines {
        search_engines.insert(key.clone(), engine.clone());
    }

    AppDataset {
        shortcuts: keyed_union(&cloud.shortcuts, &local.shortcuts, |s| s.url.clone()),
        settings,
        search_engines,
        todos: keyed_union(&cloud.todos, &local.todos, |t| t.id),
        notes: if cloud.notes.is_empty() {
            local.notes.clone()
        } else {
            cloud.notes.clone()
        },
        webdav_config: local.webdav_config.clone(),
        bookmarks: cloud.bookmarks.clone(),
    }
}

/// Union keeping the first occurrence per key, cloud side first.
fn keyed_union<T: Clone, K: Eq + Hash>(
    cloud: &[T],
    local: &[T],
    key: impl Fn(&T) -> K,
) -> Vec<T> {
    let mut seen = HashSet::new();
    cloud
        .iter()
        .chain(local.iter())
        .filter(|item| seen.insert(key(item)))
        .cloned()
        .collect()
}

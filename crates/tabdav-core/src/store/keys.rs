//! Logical storage key names.
//!
//! These are the exact key strings used by existing installations;
//! changing any of them breaks compatibility with persisted data.

pub const SETTINGS: &str = "andy_tab_settings";
pub const SHORTCUTS: &str = "andy_tab_shortcuts";
pub const WEBDAV_CONFIG: &str = "andy_tab_webdav_config";
pub const SEARCH_ENGINES: &str = "andy_tab_search_engines";
pub const OFFLINE_MIRROR: &str = "andy_tab_offline_cache";
pub const TODOS: &str = "andy_tab_todos";
pub const NOTES: &str = "andy_tab_notes";
pub const SYNC_LAST_TIMESTAMP: &str = "andy_tab_sync_lasttimestamp";
pub const USER_BOOKMARKS: &str = "user_bookmarks";

/// Keys whose mutation schedules a debounced upload. The sync timestamp
/// and the offline mirror are deliberately excluded to avoid feedback
/// loops.
pub const SYNCABLE_KEYS: &[&str] = &[
    SHORTCUTS,
    SETTINGS,
    SEARCH_ENGINES,
    TODOS,
    NOTES,
    USER_BOOKMARKS,
];

/// Whether a mutation to `key` should trigger a sync upload.
pub fn is_syncable(key: &str) -> bool {
    SYNCABLE_KEYS.contains(&key)
}

//! The full synchronizable dataset

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::WebDavConfig;
use crate::models::{BookmarkNode, SearchEngine, Shortcut, Todo};

/// Everything one snapshot carries: the unit of synchronization.
///
/// Every field is serde-defaulted so a partial snapshot decodes cleanly
/// and an encoded snapshot always contains every category, even when
/// empty. Field names match the JSON layout of existing snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppDataset {
    #[serde(default)]
    pub shortcuts: Vec<Shortcut>,
    /// Flat settings map; unknown keys pass through untouched
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub search_engines: BTreeMap<String, SearchEngine>,
    #[serde(default)]
    pub todos: Vec<Todo>,
    #[serde(default)]
    pub notes: String,
    /// Connection credentials; local copy is authoritative, never merged
    #[serde(default)]
    pub webdav_config: Option<WebDavConfig>,
    #[serde(default)]
    pub bookmarks: Vec<BookmarkNode>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_dataset_is_empty_but_complete_in_json() {
        let json = serde_json::to_value(AppDataset::default()).unwrap();
        for field in [
            "shortcuts",
            "settings",
            "searchEngines",
            "todos",
            "notes",
            "webdavConfig",
            "bookmarks",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
    }

    #[test]
    fn decodes_with_all_fields_absent() {
        let dataset: AppDataset = serde_json::from_str("{}").unwrap();
        assert_eq!(dataset, AppDataset::default());
    }

    #[test]
    fn settings_pass_unknown_keys_through() {
        let body = r#"{"settings":{"layout":"grid","experimentalFlag":true,"columns":5}}"#;
        let dataset: AppDataset = serde_json::from_str(body).unwrap();
        let json = serde_json::to_value(&dataset).unwrap();
        assert_eq!(json["settings"]["experimentalFlag"], true);
        assert_eq!(json["settings"]["columns"], 5);
    }
}

//! Shortcut model
//!
//! Shortcuts are the quick-access tiles of the new-tab page. Their list
//! order is display order; `url` is the merge key during conflict
//! resolution, but uniqueness is not enforced at write time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Icon source for a shortcut tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IconType {
    /// Icon derived from the target site
    #[default]
    Auto,
    /// User-supplied icon URL or data URI
    Custom,
}

/// A single new-tab shortcut tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortcut {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub icon_type: IconType,
    /// Icon URL or data URI; empty when `icon_type` is `Auto`
    #[serde(default)]
    pub icon: String,
    /// Optional CSS color for the tile background
    #[serde(default)]
    pub custom_color: Option<String>,
    /// ISO-8601 creation timestamp
    #[serde(default)]
    pub created_at: String,
    /// ISO-8601 last-modified timestamp
    #[serde(default)]
    pub updated_at: String,
}

impl Shortcut {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
            url: url.into(),
            icon_type: IconType::Auto,
            icon: String::new(),
            custom_color: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

//! Bookmark tree model
//!
//! Mirrors the host browser's bookmark tree as an opaque nested
//! structure. The sync engine moves the tree wholesale; reconciling it
//! with the browser's live bookmark store is the host's concern.

use serde::{Deserialize, Serialize};

/// A bookmark tree node: a leaf when `url` is set, a folder otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BookmarkNode {
    /// Host-assigned node id; opaque, not used as a merge key
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BookmarkNode>,
}

impl BookmarkNode {
    pub fn folder(title: impl Into<String>, children: Vec<BookmarkNode>) -> Self {
        Self {
            title: title.into(),
            children,
            ..Self::default()
        }
    }

    pub fn link(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn is_folder(&self) -> bool {
        self.url.is_none()
    }
}

//! Data models for the synced dataset

pub mod bookmark;
pub mod dataset;
pub mod search_engine;
pub mod shortcut;
pub mod todo;

pub use bookmark::BookmarkNode;
pub use dataset::AppDataset;
pub use search_engine::SearchEngine;
pub use shortcut::{IconType, Shortcut};
pub use todo::Todo;

//! tabdav-core - Core library for TabDAV
//!
//! This crate contains the synchronization subsystem of the TabDAV new-tab
//! extension: the data models of the synced dataset, the local key-value
//! store with its offline mirror, the WebDAV remote store client, the
//! snapshot codec, and the sync engine with its conflict-resolution flow.
//! Rendering and UI concerns live in the host applications.

pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod util;

pub use config::WebDavConfig;
pub use error::{Error, Result};
pub use models::AppDataset;
pub use remote::{RemoteStore, WebDavClient};
pub use store::LocalDataStore;
pub use sync::{ConflictResolution, ResolutionOutcome, StartupOutcome, SyncEngine, SyncPhase};

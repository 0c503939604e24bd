//! Remote object store abstraction.
//!
//! The sync engine talks to the remote through [`RemoteStore`]; the
//! shipped implementation is [`WebDavClient`]. The trait keeps the
//! engine testable against an in-memory remote and leaves room for
//! other storage protocols later.

pub mod webdav;

use async_trait::async_trait;

use crate::Result;

pub use webdav::WebDavClient;

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Last path segment, percent-decoded.
    pub name: String,
    /// Server-relative href as reported by the remote.
    pub href: String,
    pub is_directory: bool,
    /// Size in bytes; zero for directories or when unreported.
    pub size: u64,
}

/// A remote object store addressed by relative slash-separated paths.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a file's full contents.
    async fn get_file(&self, path: &str) -> Result<String>;

    /// Create or overwrite a file.
    async fn put_file(&self, path: &str, body: &str) -> Result<()>;

    /// Delete a file. Deleting a missing file is an error.
    async fn delete_file(&self, path: &str) -> Result<()>;

    /// Whether a file or directory exists. Probe failures of any kind
    /// report `false`; this never returns an error.
    async fn exists(&self, path: &str) -> bool;

    /// Create a directory. Succeeds if it already exists.
    async fn create_directory(&self, path: &str) -> Result<()>;

    /// List the immediate children of a directory, excluding the
    /// directory itself.
    async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>>;

    /// Cheap connectivity and credential probe against the store root.
    async fn test_connection(&self) -> Result<()>;

    /// [`RemoteStore::get_file`] with a per-call timeout in
    /// milliseconds. Implementations without per-call timeout support
    /// fall back to the plain fetch.
    async fn get_file_with_timeout(&self, path: &str, _timeout_ms: u64) -> Result<String> {
        self.get_file(path).await
    }

    /// [`RemoteStore::put_file`] with a per-call timeout in
    /// milliseconds.
    async fn put_file_with_timeout(&self, path: &str, body: &str, _timeout_ms: u64) -> Result<()> {
        self.put_file(path, body).await
    }
}

//! Error types for tabdav-core

use thiserror::Error;

/// Result type alias using tabdav-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tabdav-core operations.
///
/// Remote failures are kept distinguishable so callers can show
/// actionable text; the sync engine itself only propagates the kind
/// and never retries automatically.
#[derive(Error, Debug)]
pub enum Error {
    /// WebDAV configuration is missing or malformed; raised before any network call
    #[error("Invalid WebDAV configuration: {0}")]
    ConfigInvalid(String),

    /// Server rejected the configured credentials (HTTP 401)
    #[error("Authentication failed: username or password rejected")]
    AuthFailed,

    /// Credentials accepted but access denied (HTTP 403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Remote path does not exist (HTTP 404)
    #[error("Remote object not found: {0}")]
    NotFound(String),

    /// Remote server failed (HTTP 5xx)
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Could not reach the server at the transport level
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Request exceeded its configured timeout
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Request rejected by an intermediary policy (CORS-class rejection)
    #[error("Request rejected by policy: {0}")]
    PolicyRejected(String),

    /// Malformed snapshot body or directory listing
    #[error("Parse failed: {0}")]
    ParseFailed(String),

    /// Local storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything the taxonomy above does not cover
    #[error("{0}")]
    Unknown(String),
}

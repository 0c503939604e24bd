//! WebDAV connection configuration.

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

/// Default per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Credentials and endpoint for a WebDAV remote store.
///
/// The local copy is authoritative for its own connection and is never
/// merged during conflict resolution.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebDavConfig {
    /// Base URL of the WebDAV share (http/https, required)
    pub url: String,
    /// Basic-auth username; empty disables authentication
    #[serde(default)]
    pub username: String,
    /// Basic-auth password
    #[serde(default)]
    pub password: String,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl std::fmt::Debug for WebDavConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("WebDavConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl WebDavConfig {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Validate and normalize the configuration.
    ///
    /// The URL must be http/https and is normalized to end with a single
    /// trailing slash so remote paths can be appended directly.
    pub fn normalized(&self) -> Result<Self> {
        let url = normalize_text_option(Some(self.url.clone()))
            .ok_or_else(|| Error::ConfigInvalid("WebDAV URL must not be empty".to_string()))?;
        if !is_http_url(&url) {
            return Err(Error::ConfigInvalid(format!(
                "WebDAV URL must include http:// or https://: {url}"
            )));
        }

        let mut normalized = self.clone();
        normalized.url = format!("{}/", url.trim_end_matches('/'));
        normalized.username = self.username.trim().to_string();
        Ok(normalized)
    }
}

//! WebDAV implementation of [`RemoteStore`].
//!
//! Speaks plain HTTP with the WebDAV verbs the sync engine needs
//! (PROPFIND, MKCOL, COPY, MOVE plus GET/PUT/DELETE/HEAD). Directory
//! listings are pulled out of the PROPFIND multistatus response by
//! pattern matching on the handful of properties we consume; the
//! response is never interpreted as a full XML document.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Method, Response, StatusCode};

use crate::config::WebDavConfig;
use crate::remote::{DirEntry, RemoteStore};
use crate::util::compact_text;
use crate::{Error, Result};

/// WebDAV client bound to one configured share.
pub struct WebDavClient {
    config: WebDavConfig,
    http: reqwest::Client,
}

impl WebDavClient {
    /// Build a client from a configuration, validating it first.
    pub fn new(config: &WebDavConfig) -> Result<Self> {
        let config = config.normalized()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|error| Error::Unknown(error.to_string()))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &WebDavConfig {
        &self.config
    }

    /// Absolute URL for a share-relative path.
    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.config.url, path.trim_start_matches('/'))
    }

    fn method(name: &str) -> Result<Method> {
        Method::from_bytes(name.as_bytes()).map_err(|error| Error::Unknown(error.to_string()))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, String)],
        body: Option<String>,
        timeout_ms: u64,
    ) -> Result<Response> {
        let mut builder = self
            .http
            .request(method, self.url_for(path))
            .timeout(Duration::from_millis(timeout_ms));
        if !self.config.username.is_empty() {
            builder = builder.basic_auth(&self.config.username, Some(&self.config.password));
        }
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        builder
            .send()
            .await
            .map_err(|error| map_transport_error(error, timeout_ms))
    }

    /// Map non-success statuses onto the error taxonomy.
    async fn expect_success(&self, response: Response, path: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(match status.as_u16() {
            401 => Error::AuthFailed,
            403 => Error::Forbidden(path.to_string()),
            404 => Error::NotFound(path.to_string()),
            _ if status.is_server_error() => Error::ServerError {
                status: status.as_u16(),
                message: compact_text(&response.text().await.unwrap_or_default()),
            },
            _ => Error::Unknown(format!("unexpected HTTP {status} for {path}")),
        })
    }

    async fn propfind(&self, path: &str, depth: &str) -> Result<String> {
        let response = self
            .request(
                Self::method("PROPFIND")?,
                path,
                &[("Depth", depth.to_string())],
                None,
                self.config.timeout_ms,
            )
            .await?;
        let response = self.expect_success(response, path).await?;
        response
            .text()
            .await
            .map_err(|error| Error::ParseFailed(error.to_string()))
    }

    /// Server-side copy with overwrite.
    pub async fn copy_file(&self, from: &str, to: &str) -> Result<()> {
        let headers = [
            ("Destination", self.url_for(to)),
            ("Overwrite", "T".to_string()),
        ];
        let response = self
            .request(
                Self::method("COPY")?,
                from,
                &headers,
                None,
                self.config.timeout_ms,
            )
            .await?;
        self.expect_success(response, from).await.map(|_| ())
    }

    /// Server-side move (rename) with overwrite.
    pub async fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let headers = [
            ("Destination", self.url_for(to)),
            ("Overwrite", "T".to_string()),
        ];
        let response = self
            .request(
                Self::method("MOVE")?,
                from,
                &headers,
                None,
                self.config.timeout_ms,
            )
            .await?;
        self.expect_success(response, from).await.map(|_| ())
    }
}

#[async_trait]
impl RemoteStore for WebDavClient {
    async fn get_file(&self, path: &str) -> Result<String> {
        self.get_file_with_timeout(path, self.config.timeout_ms)
            .await
    }

    async fn put_file(&self, path: &str, body: &str) -> Result<()> {
        self.put_file_with_timeout(path, body, self.config.timeout_ms)
            .await
    }

    async fn get_file_with_timeout(&self, path: &str, timeout_ms: u64) -> Result<String> {
        let response = self
            .request(Method::GET, path, &[], None, timeout_ms)
            .await?;
        let response = self.expect_success(response, path).await?;
        response
            .text()
            .await
            .map_err(|error| Error::ParseFailed(error.to_string()))
    }

    async fn put_file_with_timeout(&self, path: &str, body: &str, timeout_ms: u64) -> Result<()> {
        let headers = [("Content-Type", "application/json".to_string())];
        let response = self
            .request(
                Method::PUT,
                path,
                &headers,
                Some(body.to_string()),
                timeout_ms,
            )
            .await?;
        self.expect_success(response, path).await.map(|_| ())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, path, &[], None, self.config.timeout_ms)
            .await?;
        self.expect_success(response, path).await.map(|_| ())
    }

    async fn exists(&self, path: &str) -> bool {
        match self
            .request(Method::HEAD, path, &[], None, self.config.timeout_ms)
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        let response = self
            .request(
                Self::method("MKCOL")?,
                path,
                &[],
                None,
                self.config.timeout_ms,
            )
            .await?;
        // 405 means the collection is already there.
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            return Ok(());
        }
        self.expect_success(response, path).await.map(|_| ())
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>> {
        let xml = self.propfind(path, "1").await?;
        let url = self.url_for(path);
        let base = url_path(&url);
        Ok(parse_directory_listing(&xml, base))
    }

    async fn test_connection(&self) -> Result<()> {
        self.propfind("", "0").await.map(|_| ())
    }
}

fn map_transport_error(error: reqwest::Error, timeout_ms: u64) -> Error {
    if error.is_timeout() {
        Error::Timeout(timeout_ms)
    } else if error.is_connect() {
        Error::NetworkUnreachable(error.to_string())
    } else {
        Error::Unknown(error.to_string())
    }
}

/// Path component of an absolute http(s) URL.
fn url_path(url: &str) -> &str {
    let after_scheme = match url.find("://") {
        Some(index) => &url[index + 3..],
        None => url,
    };
    match after_scheme.find('/') {
        Some(index) => &after_scheme[index..],
        None => "/",
    }
}

/// Minimal percent-decoding for listing hrefs; malformed escapes pass
/// through untouched.
fn percent_decode(input: &str) -> String {
    fn hex_digit(byte: u8) -> Option<u8> {
        (byte as char).to_digit(16).map(|digit| digit as u8)
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_digit(bytes[index + 1]), hex_digit(bytes[index + 2]))
            {
                out.push(high * 16 + low);
                index += 3;
                continue;
            }
        }
        out.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

static RESPONSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(?:\w+:)?response[\s>].*?</(?:\w+:)?response>").unwrap());
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(?:\w+:)?href[^>]*>\s*(.*?)\s*</(?:\w+:)?href>").unwrap());
static COLLECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:\w+:)?collection\s*/?\s*>").unwrap());
static CONTENT_LENGTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(?:\w+:)?getcontentlength[^>]*>\s*(\d+)\s*<").unwrap());

/// Extract directory entries from a PROPFIND multistatus body.
///
/// Only href, resourcetype/collection and getcontentlength are
/// consumed. The entry describing the listed directory itself (href
/// equal to `base`) is dropped.
fn parse_directory_listing(xml: &str, base: &str) -> Vec<DirEntry> {
    let base = base.trim_end_matches('/');
    let mut entries = Vec::new();
    for block in RESPONSE_RE.find_iter(xml) {
        let block = block.as_str();
        let Some(href) = HREF_RE.captures(block).map(|captures| captures[1].to_string()) else {
            continue;
        };
        let trimmed = href.trim_end_matches('/');
        if trimmed == base || percent_decode(trimmed) == percent_decode(base) {
            continue;
        }
        let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
        let is_directory = COLLECTION_RE.is_match(block);
        let size = CONTENT_LENGTH_RE
            .captures(block)
            .and_then(|captures| captures[1].parse().ok())
            .unwrap_or(0);
        entries.push(DirEntry {
            name: percent_decode(name),
            href,
            is_directory,
            size,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;

    const MULTISTATUS: &str = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/AndyTab/</d:href>
    <d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/AndyTab/bookmarks_sync_2024-05-01_1714550400000.json</d:href>
    <d:propstat><d:prop>
      <d:resourcetype/>
      <d:getcontentlength>2048</d:getcontentlength>
    </d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/AndyTab/old%20backups/</d:href>
    <d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn parses_multistatus_and_excludes_listed_directory() {
        let entries = parse_directory_listing(MULTISTATUS, "/AndyTab/");
        assert_eq!(entries.len(), 2);

        assert_eq!(
            entries[0].name,
            "bookmarks_sync_2024-05-01_1714550400000.json"
        );
        assert!(!entries[0].is_directory);
        assert_eq!(entries[0].size, 2048);

        assert_eq!(entries[1].name, "old backups");
        assert!(entries[1].is_directory);
        assert_eq!(entries[1].size, 0);
    }

    #[test]
    fn url_path_strips_scheme_and_host() {
        assert_eq!(url_path("https://dav.example.com/share/AndyTab/"), "/share/AndyTab/");
        assert_eq!(url_path("http://127.0.0.1:8080"), "/");
    }

    #[test]
    fn percent_decode_handles_escapes_and_garbage() {
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }

    /// Serve exactly one canned HTTP response and hand back the raw
    /// request the client sent.
    async fn one_shot_server(response: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                raw.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text
                        .lines()
                        .find_map(|line| {
                            line.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{addr}/"), handle)
    }

    fn client_for(url: &str) -> WebDavClient {
        WebDavClient::new(&WebDavConfig::new(url, "alice", "hunter2")).unwrap()
    }

    #[tokio::test]
    async fn get_file_sends_basic_auth_and_returns_body() {
        let (url, request) =
            one_shot_server("HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello").await;
        let client = client_for(&url);

        let body = client.get_file("AndyTab/x.json").await.unwrap();
        assert_eq!(body, "hello");

        let raw = request.await.unwrap().to_ascii_lowercase();
        assert!(raw.starts_with("get /andytab/x.json"));
        assert!(raw.contains("authorization: basic "));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_failed() {
        let (url, _request) =
            one_shot_server("HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\n\r\n").await;
        let client = client_for(&url);

        assert!(matches!(
            client.get_file("AndyTab/x.json").await,
            Err(Error::AuthFailed)
        ));
    }

    #[tokio::test]
    async fn server_error_carries_status_and_body() {
        let (url, _request) =
            one_shot_server("HTTP/1.1 507 Insufficient Storage\r\nContent-Length: 9\r\n\r\ndisk full").await;
        let client = client_for(&url);

        match client.put_file("AndyTab/x.json", "{}").await {
            Err(Error::ServerError { status, message }) => {
                assert_eq!(status, 507);
                assert_eq!(message, "disk full");
            }
            other => panic!("expected ServerError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_directory_tolerates_method_not_allowed() {
        let (url, request) =
            one_shot_server("HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n").await;
        let client = client_for(&url);

        client.create_directory("AndyTab").await.unwrap();
        let raw = request.await.unwrap().to_ascii_lowercase();
        assert!(raw.starts_with("mkcol /andytab"));
    }

    #[tokio::test]
    async fn copy_file_sends_destination_and_overwrite_headers() {
        let (url, request) =
            one_shot_server("HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n").await;
        let client = client_for(&url);

        client
            .copy_file("AndyTab/a.json", "AndyTab/b.json")
            .await
            .unwrap();

        let raw = request.await.unwrap().to_ascii_lowercase();
        assert!(raw.starts_with("copy /andytab/a.json"));
        assert!(raw.contains("/andytab/b.json"));
        assert!(raw.contains("overwrite: t"));
    }

    #[tokio::test]
    async fn propfind_listing_uses_depth_one() {
        let body = MULTISTATUS;
        let response = format!(
            "HTTP/1.1 207 Multi-Status\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let response: &'static str = Box::leak(response.into_boxed_str());
        let (url, request) = one_shot_server(response).await;
        let client = client_for(&url);

        let entries = client.list_directory("AndyTab").await.unwrap();
        // The listed directory's own entry is excluded.
        let names: Vec<&str> = entries.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["bookmarks_sync_2024-05-01_1714550400000.json", "old backups"]
        );

        let raw = request.await.unwrap().to_ascii_lowercase();
        assert!(raw.starts_with("propfind /andytab"));
        assert!(raw.contains("depth: 1"));
    }

    #[tokio::test]
    async fn hanging_server_times_out_without_blocking_other_work() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold the connection open without ever answering.
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(socket);
        });

        let mut config = WebDavConfig::new(format!("http://{addr}/"), "", "");
        config.timeout_ms = 200;
        let client = WebDavClient::new(&config).unwrap();

        let pending = tokio::spawn(async move { client.get_file("AndyTab/x.json").await });

        // Local work proceeds while the request is stuck.
        let store = crate::LocalDataStore::new(std::sync::Arc::new(
            crate::store::MemoryBackend::new(),
        ));
        store
            .set(crate::store::keys::NOTES, serde_json::json!("still responsive"))
            .await
            .unwrap();

        assert!(matches!(pending.await.unwrap(), Err(Error::Timeout(200))));
    }
}

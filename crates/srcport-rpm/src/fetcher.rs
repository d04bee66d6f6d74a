//! Scheme-addressed resource retrieval
//!
//! A [`ResourceFetcher`] turns a URI into bytes. [`SchemeFetcher`] dispatches
//! on the URI scheme to a registered backend; the default set covers
//! `http`, `https` and `file`. `memory://` is backed by [`MemoryFetcher`]
//! and is registered explicitly, mostly by tests.

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use srcport_core::{DownloadFailureKind, ServiceError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("resource {uri} not found")]
    Absent { uri: String },

    #[error("transient failure fetching {uri}: {reason}")]
    Transient { uri: String, reason: String },

    #[error("checksum mismatch for {uri}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        uri: String,
        expected: String,
        actual: String,
    },

    #[error("unsupported scheme in {uri}")]
    UnsupportedScheme { uri: String },

    #[error("invalid resource uri {uri}")]
    InvalidUri { uri: String },
}

impl FetchError {
    pub fn uri(&self) -> &str {
        match self {
            FetchError::Absent { uri }
            | FetchError::Transient { uri, .. }
            | FetchError::ChecksumMismatch { uri, .. }
            | FetchError::UnsupportedScheme { uri }
            | FetchError::InvalidUri { uri } => uri,
        }
    }

    pub fn kind(&self) -> DownloadFailureKind {
        match self {
            FetchError::Transient { .. } => DownloadFailureKind::Transient,
            FetchError::ChecksumMismatch { .. } => DownloadFailureKind::ChecksumMismatch,
            FetchError::Absent { .. }
            | FetchError::UnsupportedScheme { .. }
            | FetchError::InvalidUri { .. } => DownloadFailureKind::Absent,
        }
    }
}

impl From<FetchError> for ServiceError {
    fn from(error: FetchError) -> Self {
        ServiceError::download(error.uri().to_string(), error.kind(), error.to_string())
    }
}

/// Lowercase hex SHA-256 of `content`
pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Retrieve the resource without any integrity check.
    async fn fetch_raw(&self, uri: &str) -> Result<Bytes, FetchError>;

    /// Retrieve the resource and, when `expected_sha256` is non-empty,
    /// verify its digest. The comparison ignores hex case.
    async fn fetch(&self, uri: &str, expected_sha256: &str) -> Result<Bytes, FetchError> {
        let content = self.fetch_raw(uri).await?;
        if expected_sha256.is_empty() {
            return Ok(content);
        }

        let actual = sha256_hex(&content);
        if !actual.eq_ignore_ascii_case(expected_sha256) {
            warn!("checksum mismatch for {}: expected {}", uri, expected_sha256);
            return Err(FetchError::ChecksumMismatch {
                uri: uri.to_string(),
                expected: expected_sha256.to_lowercase(),
                actual,
            });
        }
        Ok(content)
    }
}

fn split_scheme(uri: &str) -> Result<(&str, &str), FetchError> {
    match uri.split_once("://") {
        Some((scheme, rest)) if !scheme.is_empty() => Ok((scheme, rest)),
        _ => Err(FetchError::InvalidUri {
            uri: uri.to_string(),
        }),
    }
}

/// `http://` and `https://` retrieval with a bounded per-request timeout
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch_raw(&self, uri: &str) -> Result<Bytes, FetchError> {
        debug!("fetching {}", uri);
        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let transient = status.is_server_error()
                || status == reqwest::StatusCode::REQUEST_TIMEOUT
                || status == reqwest::StatusCode::TOO_MANY_REQUESTS;
            return Err(if transient {
                FetchError::Transient {
                    uri: uri.to_string(),
                    reason: format!("upstream returned {}", status),
                }
            } else {
                FetchError::Absent {
                    uri: uri.to_string(),
                }
            });
        }

        response.bytes().await.map_err(|e| FetchError::Transient {
            uri: uri.to_string(),
            reason: e.to_string(),
        })
    }
}

/// `file://` retrieval from the local filesystem
#[derive(Default)]
pub struct FileFetcher;

#[async_trait]
impl ResourceFetcher for FileFetcher {
    async fn fetch_raw(&self, uri: &str) -> Result<Bytes, FetchError> {
        let (_, path) = split_scheme(uri)?;
        match tokio::fs::read(path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FetchError::Absent {
                uri: uri.to_string(),
            }),
            Err(e) => Err(FetchError::Transient {
                uri: uri.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// `memory://<key>` retrieval from an in-process map
#[derive(Default, Clone)]
pub struct MemoryFetcher {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content` under `key`; it is then reachable as `memory://<key>`.
    pub async fn insert(&self, key: impl Into<String>, content: impl Into<Bytes>) {
        self.objects.write().await.insert(key.into(), content.into());
    }
}

#[async_trait]
impl ResourceFetcher for MemoryFetcher {
    async fn fetch_raw(&self, uri: &str) -> Result<Bytes, FetchError> {
        let (_, key) = split_scheme(uri)?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| FetchError::Absent {
                uri: uri.to_string(),
            })
    }
}

/// Dispatches to a backend by URI scheme
#[derive(Clone)]
pub struct SchemeFetcher {
    backends: HashMap<String, Arc<dyn ResourceFetcher>>,
}

impl SchemeFetcher {
    /// A dispatcher with no registered schemes
    pub fn empty() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// `http`, `https` and `file`; fails only if the HTTP client cannot be built
    pub fn with_defaults(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http: Arc<dyn ResourceFetcher> = Arc::new(HttpFetcher::new(timeout)?);
        Ok(Self::empty()
            .register("http", http.clone())
            .register("https", http)
            .register("file", Arc::new(FileFetcher)))
    }

    pub fn register(mut self, scheme: &str, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.backends.insert(scheme.to_ascii_lowercase(), fetcher);
        self
    }
}

#[async_trait]
impl ResourceFetcher for SchemeFetcher {
    async fn fetch_raw(&self, uri: &str) -> Result<Bytes, FetchError> {
        let (scheme, _) = split_scheme(uri)?;
        let backend = self
            .backends
            .get(&scheme.to_ascii_lowercase())
            .ok_or_else(|| FetchError::UnsupportedScheme {
                uri: uri.to_string(),
            })?;
        backend.fetch_raw(uri).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // sha256("hello")
    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[tokio::test]
    async fn test_memory_fetch_with_checksum() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("hello.txt", "hello").await;

        let content = fetcher.fetch("memory://hello.txt", HELLO_SHA256).await.unwrap();
        assert_eq!(&content[..], b"hello");

        let upper = HELLO_SHA256.to_uppercase();
        assert!(fetcher.fetch("memory://hello.txt", &upper).await.is_ok());
        assert!(fetcher.fetch("memory://hello.txt", "").await.is_ok());
    }

    #[tokio::test]
    async fn test_checksum_mismatch() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("hello.txt", "hello").await;

        let err = fetcher
            .fetch("memory://hello.txt", &"0".repeat(64))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), DownloadFailureKind::ChecksumMismatch);

        let service: ServiceError = err.into();
        assert!(service.to_string().contains("failed to download resource"));
        assert!(!service.is_retryable());
    }

    #[tokio::test]
    async fn test_memory_missing_is_absent() {
        let err = MemoryFetcher::new()
            .fetch_raw("memory://nope")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Absent { .. }));
    }

    #[tokio::test]
    async fn test_file_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("pkg.src.rpm");
        std::fs::write(&file, b"hello").unwrap();

        let uri = format!("file://{}", file.display());
        let content = FileFetcher.fetch(&uri, HELLO_SHA256).await.unwrap();
        assert_eq!(&content[..], b"hello");

        let missing = format!("file://{}", dir.path().join("missing").display());
        let err = FileFetcher.fetch_raw(&missing).await.unwrap_err();
        assert_eq!(err.kind(), DownloadFailureKind::Absent);
    }

    #[tokio::test]
    async fn test_http_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.rpm"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.rpm"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky.rpm"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow.rpm"))
            .respond_with(ResponseTemplate::new(408))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/throttled.rpm"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forbidden.rpm"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();

        let ok = fetcher
            .fetch(&format!("{}/ok.rpm", server.uri()), HELLO_SHA256)
            .await
            .unwrap();
        assert_eq!(&ok[..], b"hello");

        let gone = fetcher
            .fetch_raw(&format!("{}/gone.rpm", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(gone.kind(), DownloadFailureKind::Absent);

        let flaky = fetcher
            .fetch_raw(&format!("{}/flaky.rpm", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(flaky.kind(), DownloadFailureKind::Transient);
        assert!(ServiceError::from(flaky).is_retryable());

        for transient in ["slow.rpm", "throttled.rpm"] {
            let err = fetcher
                .fetch_raw(&format!("{}/{}", server.uri(), transient))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), DownloadFailureKind::Transient, "{}", transient);
        }

        let forbidden = fetcher
            .fetch_raw(&format!("{}/forbidden.rpm", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(forbidden.kind(), DownloadFailureKind::Absent);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        // Bind then release a port so nothing is listening on it.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch_raw(&format!("http://{}/pkg.src.rpm", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transient { .. }));
        assert!(ServiceError::from(err).is_retryable());
    }

    #[tokio::test]
    async fn test_scheme_dispatch() {
        let memory = MemoryFetcher::new();
        memory.insert("a", "hello").await;
        let fetcher = SchemeFetcher::with_defaults(Duration::from_secs(5))
            .unwrap()
            .register("memory", Arc::new(memory));

        assert!(fetcher.fetch_raw("memory://a").await.is_ok());

        let err = fetcher.fetch_raw("ftp://mirror/a.rpm").await.unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedScheme { .. }));
        assert_eq!(err.kind(), DownloadFailureKind::Absent);

        let err = fetcher.fetch_raw("not a uri").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUri { .. }));
    }
}

//! Loaders for remote sources.
//!
//! Transport is not implemented here. The host supplies an [`HttpFetcher`] or
//! an [`ObjectStoreClient`]; these loaders validate locators, enforce size
//! limits, and fill in metadata the transport did not report.

use crate::{LoadedMedia, Loader, sniff_mime};
use std::sync::Arc;
use tempera_core::MediaSource;
use tempera_error::{MediaError, MediaErrorKind};

/// Default cap on remote payloads (50MB).
const DEFAULT_MAX_REMOTE_BYTES: u64 = 50 * 1024 * 1024;

/// Body returned by a host transport.
#[derive(Debug, Clone, Default)]
pub struct FetchedBody {
    /// Response bytes
    pub bytes: Vec<u8>,
    /// Content-Type header, if any
    pub content_type: Option<String>,
}

/// Host-supplied HTTP transport.
#[async_trait::async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Fetch `url` and return its body.
    async fn fetch(
        &self,
        url: &str,
    ) -> Result<FetchedBody, Box<dyn std::error::Error + Send + Sync>>;
}

/// Host-supplied object storage client.
#[async_trait::async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Read the object at `bucket/path`.
    async fn get_object(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<FetchedBody, Box<dyn std::error::Error + Send + Sync>>;
}

fn check_size(size: usize, limit: u64) -> Result<(), MediaError> {
    if size as u64 > limit {
        return Err(MediaError::new(MediaErrorKind::TooLarge {
            size: size as u64,
            limit,
        }));
    }
    Ok(())
}

fn into_loaded(body: FetchedBody) -> LoadedMedia {
    let declared = body
        .content_type
        .filter(|ct| !ct.is_empty() && !ct.starts_with("application/octet-stream"));
    let mime_type = declared.or_else(|| sniff_mime(&body.bytes).map(str::to_string));
    let mut loaded = LoadedMedia::new(body.bytes);
    loaded.mime_type = mime_type;
    loaded
}

/// Loads `http://` and `https://` URLs through an [`HttpFetcher`].
pub struct UrlLoader {
    fetcher: Arc<dyn HttpFetcher>,
    max_bytes: u64,
}

impl UrlLoader {
    /// Loader over the given transport with the default 50MB cap.
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            fetcher,
            max_bytes: DEFAULT_MAX_REMOTE_BYTES,
        }
    }

    /// Override the payload cap.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl std::fmt::Debug for UrlLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlLoader")
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Loader for UrlLoader {
    fn name(&self) -> &str {
        "url"
    }

    #[tracing::instrument(skip(self, source), fields(url = %source.display_locator()))]
    async fn load(&self, source: &MediaSource) -> Result<LoadedMedia, MediaError> {
        let url = source.locator();
        let lower = url.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(MediaError::new(MediaErrorKind::InvalidLocator(format!(
                "unsupported URL scheme: {}",
                source.display_locator()
            ))));
        }

        let body = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| MediaError::loader("url", e.to_string()))?;
        check_size(body.bytes.len(), self.max_bytes)?;

        tracing::debug!(size = body.bytes.len(), content_type = ?body.content_type, "Fetched URL");
        Ok(into_loaded(body).with_metadata("url", url))
    }
}

/// Split an object-store locator into `(bucket, path)`.
///
/// Accepts `bucket/path/to/key` and `s3://bucket/path/to/key`.
///
/// ```
/// use tempera_storage::parse_object_locator;
///
/// assert_eq!(parse_object_locator("s3://media/a/b.png").unwrap(), ("media", "a/b.png"));
/// assert!(parse_object_locator("no-path").is_err());
/// ```
pub fn parse_object_locator(locator: &str) -> Result<(&str, &str), MediaError> {
    let trimmed = locator
        .strip_prefix("s3://")
        .or_else(|| locator.strip_prefix("gs://"))
        .unwrap_or(locator);
    match trimmed.split_once('/') {
        Some((bucket, path)) if !bucket.is_empty() && !path.is_empty() => Ok((bucket, path)),
        _ => Err(MediaError::new(MediaErrorKind::InvalidLocator(format!(
            "expected bucket/path, got '{}'",
            locator
        )))),
    }
}

/// Loads object-store sources through an [`ObjectStoreClient`].
pub struct ObjectStoreLoader {
    client: Arc<dyn ObjectStoreClient>,
    max_bytes: u64,
}

impl ObjectStoreLoader {
    /// Loader over the given client with the default 50MB cap.
    pub fn new(client: Arc<dyn ObjectStoreClient>) -> Self {
        Self {
            client,
            max_bytes: DEFAULT_MAX_REMOTE_BYTES,
        }
    }

    /// Override the payload cap.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl std::fmt::Debug for ObjectStoreLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreLoader")
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Loader for ObjectStoreLoader {
    fn name(&self) -> &str {
        "object_store"
    }

    #[tracing::instrument(skip(self, source), fields(locator = %source.locator()))]
    async fn load(&self, source: &MediaSource) -> Result<LoadedMedia, MediaError> {
        let (bucket, path) = parse_object_locator(source.locator())?;

        let body = self
            .client
            .get_object(bucket, path)
            .await
            .map_err(|e| MediaError::loader("object_store", e.to_string()))?;
        check_size(body.bytes.len(), self.max_bytes)?;

        tracing::debug!(bucket, path, size = body.bytes.len(), "Fetched object");
        Ok(into_loaded(body)
            .with_metadata("bucket", bucket)
            .with_metadata("path", path))
    }
}

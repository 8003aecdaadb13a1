//! Lazy media references.

use crate::{InMemoryLoader, LoadedMedia, Loader, MediaMetadata, sniff_dimensions, sniff_mime};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tempera_core::{MediaSource, SourceType};
use tempera_error::{MediaError, MediaErrorKind, TemperaResult};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How long cached bytes are considered fresh (30 minutes).
///
/// Expiry is reported by [`MediaReference::is_expired`] but never swept.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// What a reference does after its loader fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadErrorPolicy {
    /// Memoize the failure; every later call returns it without touching the
    /// loader until [`MediaReference::evict_from_cache`] clears it.
    #[default]
    Sticky,
    /// Do not memoize; the next call invokes the loader again.
    Retry,
}

#[derive(Debug, Default)]
struct ReferenceState {
    metadata: MediaMetadata,
    bytes: Option<Arc<[u8]>>,
    cached_at: Option<DateTime<Utc>>,
    cache_expiry: Option<DateTime<Utc>>,
    error: Option<MediaError>,
}

/// Lazy handle to a media payload.
///
/// Bytes are fetched through the configured [`Loader`] on first access and
/// cached until evicted. Concurrent first accesses share a single loader
/// call: the fast path reads the cached state, and a miss takes the
/// per-reference load lock and checks again before loading.
///
/// Invariant: bytes are present exactly when the reference is cached and
/// holds no error.
///
/// # Example
///
/// ```rust
/// use tempera_storage::MediaReference;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let reference = MediaReference::from_memory(b"GIF89a...".to_vec(), "image/gif");
/// let url = reference.get_data_url().await?;
/// assert!(url.starts_with("data:image/gif;base64,"));
/// # Ok(())
/// # }
/// ```
pub struct MediaReference {
    id: Uuid,
    source: MediaSource,
    loader: Arc<dyn Loader>,
    policy: LoadErrorPolicy,
    load_timeout: Option<Duration>,
    state: RwLock<ReferenceState>,
    load_lock: tokio::sync::Mutex<()>,
}

impl MediaReference {
    /// Create an unloaded reference to `source`, fetched through `loader`.
    pub fn new(source: MediaSource, loader: Arc<dyn Loader>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            loader,
            policy: LoadErrorPolicy::default(),
            load_timeout: None,
            state: RwLock::new(ReferenceState::default()),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Create a reference over bytes already in memory.
    ///
    /// The reference starts out cached; after eviction it reloads from the
    /// same in-memory payload.
    pub fn from_memory(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        let mime_type = mime_type.into();
        let loader = InMemoryLoader::new(Arc::clone(&bytes), Some(mime_type.clone()));
        let reference = Self::new(
            MediaSource::inline_memory(format!("{} bytes", bytes.len())),
            Arc::new(loader),
        )
        .with_mime_type(mime_type);

        // Cached bytes are never empty; an empty payload stays lazy and fails on load.
        if bytes.is_empty() {
            return reference;
        }
        let now = Utc::now();
        {
            let mut state = reference.write_state();
            state.metadata.size_bytes = bytes.len() as u64;
            if let Some((width, height)) = sniff_dimensions(&bytes) {
                state.metadata.width = Some(width);
                state.metadata.height = Some(height);
            }
            state.bytes = Some(bytes);
            state.cached_at = Some(now);
            state.cache_expiry = Some(expiry_after(now));
        }
        reference
    }

    /// Set the MIME type known before loading.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.state_mut().metadata.mime_type = mime_type.into();
        self
    }

    /// Set the payload size known before loading.
    pub fn with_size_hint(mut self, size_bytes: u64) -> Self {
        self.state_mut().metadata.size_bytes = size_bytes;
        self
    }

    /// Add a free-form metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.state_mut().metadata.extra.insert(key.into(), value.into());
        self
    }

    /// Choose the load error policy.
    pub fn with_policy(mut self, policy: LoadErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bound each loader invocation by `timeout`.
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    /// Unique identifier generated at creation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Source descriptor.
    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    /// Load error policy in effect.
    pub fn policy(&self) -> LoadErrorPolicy {
        self.policy
    }

    /// Copy of the current metadata.
    pub fn metadata(&self) -> MediaMetadata {
        self.read_state().metadata.clone()
    }

    /// MIME type, empty when not yet known.
    pub fn mime_type(&self) -> String {
        self.read_state().metadata.mime_type.clone()
    }

    /// Last known payload size in bytes.
    pub fn size(&self) -> u64 {
        self.read_state().metadata.size_bytes
    }

    /// Whether bytes are currently cached.
    pub fn is_cached(&self) -> bool {
        self.read_state().bytes.is_some()
    }

    /// When the bytes were cached.
    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        self.read_state().cached_at
    }

    /// When the cached bytes go stale.
    pub fn cache_expiry(&self) -> Option<DateTime<Utc>> {
        self.read_state().cache_expiry
    }

    /// Whether cached bytes are past their expiry.
    pub fn is_expired(&self) -> bool {
        self.read_state()
            .cache_expiry
            .map(|expiry| Utc::now() > expiry)
            .unwrap_or(false)
    }

    /// The memoized load error, if any.
    pub fn error(&self) -> Option<MediaError> {
        self.read_state().error.clone()
    }

    /// Bytes of payload currently held; 0 when not cached.
    pub fn estimate_memory_usage(&self) -> u64 {
        self.read_state()
            .bytes
            .as_ref()
            .map(|bytes| bytes.len() as u64)
            .unwrap_or(0)
    }

    /// Get the payload, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns the loader failure, or the memoized failure under
    /// [`LoadErrorPolicy::Sticky`].
    pub async fn get_bytes(&self) -> TemperaResult<Arc<[u8]>> {
        let (bytes, _) = self.fetch(None).await?;
        Ok(bytes)
    }

    /// [`MediaReference::get_bytes`], abandoning the wait when `cancel` fires.
    ///
    /// Cancellation is reported as [`MediaErrorKind::Cancelled`] and is never memoized.
    pub async fn get_bytes_with(&self, cancel: &CancellationToken) -> TemperaResult<Arc<[u8]>> {
        let (bytes, _) = self.fetch(Some(cancel)).await?;
        Ok(bytes)
    }

    /// Payload as a `data:` URL.
    ///
    /// Base64 sources are returned without loading: verbatim when the locator
    /// already is a data URL, otherwise wrapped with the known MIME type.
    pub async fn get_data_url(&self) -> TemperaResult<String> {
        if self.source.source_type() == SourceType::Base64 {
            let locator = self.source.locator().trim();
            if locator.starts_with("data:") {
                return Ok(locator.to_string());
            }
            let mime = self.read_state().metadata.mime_or_default().to_string();
            return Ok(format!("data:{};base64,{}", mime, locator));
        }

        let bytes = self.get_bytes().await?;
        let mime = self.read_state().metadata.mime_or_default().to_string();
        Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&bytes)))
    }

    /// Drop cached bytes and any memoized error.
    ///
    /// Identity and metadata are kept, so the next access reloads. Returns the
    /// number of bytes released.
    pub fn evict_from_cache(&self) -> u64 {
        let mut state = self.write_state();
        let freed = state
            .bytes
            .take()
            .map(|bytes| bytes.len() as u64)
            .unwrap_or(0);
        state.cached_at = None;
        state.cache_expiry = None;
        state.error = None;
        if freed > 0 {
            tracing::debug!(id = %self.id, freed, "Evicted media bytes");
        }
        freed
    }

    /// Load or return cached bytes; the flag is `true` when this call ran the loader.
    pub(crate) async fn fetch(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<(Arc<[u8]>, bool), MediaError> {
        if let Some(outcome) = self.cached_outcome() {
            return outcome.map(|bytes| (bytes, false));
        }

        let _guard = match cancel {
            Some(token) => tokio::select! {
                guard = self.load_lock.lock() => guard,
                _ = token.cancelled() => return Err(MediaError::new(MediaErrorKind::Cancelled)),
            },
            None => self.load_lock.lock().await,
        };

        // Another caller may have finished loading while we waited.
        if let Some(outcome) = self.cached_outcome() {
            return outcome.map(|bytes| (bytes, false));
        }

        let result = self.invoke_loader(cancel).await.and_then(|loaded| {
            if loaded.bytes.is_empty() {
                Err(MediaError::loader(self.loader.name(), "loader returned an empty payload"))
            } else {
                Ok(loaded)
            }
        });
        match result {
            Ok(loaded) => Ok((self.store_loaded(loaded), true)),
            Err(err) => {
                if self.policy == LoadErrorPolicy::Sticky && !err.is_interruption() {
                    self.write_state().error = Some(err.clone());
                }
                tracing::warn!(
                    id = %self.id,
                    source = %self.source,
                    loader = self.loader.name(),
                    error = %err,
                    "Media load failed"
                );
                Err(err)
            }
        }
    }

    fn cached_outcome(&self) -> Option<Result<Arc<[u8]>, MediaError>> {
        let state = self.read_state();
        if let Some(err) = &state.error {
            return Some(Err(err.clone()));
        }
        state.bytes.as_ref().map(|bytes| Ok(Arc::clone(bytes)))
    }

    async fn invoke_loader(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<LoadedMedia, MediaError> {
        let load = async {
            match self.load_timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, self.loader.load(&self.source)).await {
                        Ok(result) => result,
                        Err(_) => Err(MediaError::new(MediaErrorKind::LoadTimeout(
                            limit.as_millis() as u64,
                        ))),
                    }
                }
                None => self.loader.load(&self.source).await,
            }
        };

        match cancel {
            Some(token) => tokio::select! {
                result = load => result,
                _ = token.cancelled() => Err(MediaError::new(MediaErrorKind::Cancelled)),
            },
            None => load.await,
        }
    }

    fn store_loaded(&self, loaded: LoadedMedia) -> Arc<[u8]> {
        let LoadedMedia {
            bytes,
            mime_type,
            width,
            height,
            metadata,
        } = loaded;

        let dimensions = match (width, height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => sniff_dimensions(&bytes),
        };
        let bytes: Arc<[u8]> = bytes.into();
        let now = Utc::now();

        let mut state = self.write_state();
        let meta = &mut state.metadata;
        meta.size_bytes = bytes.len() as u64;
        if let Some(mime) = mime_type {
            meta.mime_type = mime;
        } else if meta.mime_type.is_empty() {
            if let Some(mime) = sniff_mime(&bytes) {
                meta.mime_type = mime.to_string();
            }
        }
        if let Some((w, h)) = dimensions {
            meta.width = Some(w);
            meta.height = Some(h);
        }
        merge_metadata(&mut meta.extra, metadata);

        state.bytes = Some(Arc::clone(&bytes));
        state.cached_at = Some(now);
        state.cache_expiry = Some(expiry_after(now));
        state.error = None;

        tracing::debug!(
            id = %self.id,
            size = bytes.len(),
            mime = %state.metadata.mime_type,
            "Loaded media bytes"
        );
        bytes
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ReferenceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ReferenceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut ReferenceState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

fn expiry_after(now: DateTime<Utc>) -> DateTime<Utc> {
    chrono::Duration::from_std(DEFAULT_CACHE_TTL)
        .map(|ttl| now + ttl)
        .unwrap_or(now)
}

fn merge_metadata(target: &mut HashMap<String, String>, incoming: HashMap<String, String>) {
    for (key, value) in incoming {
        target.insert(key, value);
    }
}

impl std::fmt::Debug for MediaReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("MediaReference")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("loader", &self.loader.name())
            .field("policy", &self.policy)
            .field("cached", &state.bytes.is_some())
            .field("size_bytes", &state.metadata.size_bytes)
            .field("error", &state.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_memory_starts_cached() {
        let reference = MediaReference::from_memory(vec![7u8; 32], "image/png");
        assert!(reference.is_cached());
        assert_eq!(reference.estimate_memory_usage(), 32);
        assert_eq!(reference.size(), 32);
        assert!(reference.cached_at().is_some());
        assert!(!reference.is_expired());
    }

    #[test]
    fn eviction_keeps_identity_and_metadata() {
        let reference = MediaReference::from_memory(vec![1u8; 16], "image/gif");
        let id = reference.id();
        assert_eq!(reference.evict_from_cache(), 16);
        assert_eq!(reference.evict_from_cache(), 0);
        assert!(!reference.is_cached());
        assert!(reference.cache_expiry().is_none());
        assert_eq!(reference.id(), id);
        assert_eq!(reference.mime_type(), "image/gif");
    }

    #[tokio::test]
    async fn evicted_memory_reference_reloads() {
        let reference = MediaReference::from_memory(vec![3u8, 4, 5], "image/png");
        reference.evict_from_cache();
        let bytes = reference.get_bytes().await.unwrap();
        assert_eq!(&*bytes, &[3, 4, 5]);
        assert!(reference.is_cached());
    }

    #[tokio::test]
    async fn base64_data_url_is_returned_verbatim() {
        let reference = MediaReference::new(
            MediaSource::base64("data:image/png;base64,aGk="),
            Arc::new(crate::Base64Loader),
        );
        let url = reference.get_data_url().await.unwrap();
        assert_eq!(url, "data:image/png;base64,aGk=");
        assert!(!reference.is_cached());
    }

    #[tokio::test]
    async fn raw_base64_is_wrapped_with_known_mime() {
        let reference = MediaReference::new(MediaSource::base64("aGk="), Arc::new(crate::Base64Loader))
            .with_mime_type("text/plain");
        let url = reference.get_data_url().await.unwrap();
        assert_eq!(url, "data:text/plain;base64,aGk=");
    }
}

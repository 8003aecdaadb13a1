//! Per-execution key/value store with media support.

use crate::{ContextConfig, ContextValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tempera_core::{MediaSource, SourceType};
use tempera_error::{
    ContextError, ContextErrorKind, JsonError, MediaError, MediaErrorKind, TemperaResult,
};
use tempera_storage::{
    LoaderRegistry, MediaMetrics, MediaReference, ReferenceCollection,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What a key holds.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextEntry {
    /// A plain value
    Value(ContextValue),
    /// A media reference registered in the store's collection
    Media(Uuid),
}

/// Key/value store owned by one workflow execution.
///
/// Every key maps to exactly one [`ContextEntry`], so a key cannot hold a
/// value and media at once and removing a key always releases its media.
/// Media is held by the store's [`ReferenceCollection`], which keeps cached
/// bytes under [`ContextConfig::max_memory_bytes`].
///
/// Dropping the store clears the collection.
///
/// # Example
///
/// ```rust
/// use tempera_context::{ContextConfig, ContextStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = ContextStore::new(ContextConfig::default());
/// store.set("caption", "a cat on a mat");
/// store.set_image_from_memory("photo", vec![0u8; 2048], "image/png")?;
///
/// assert_eq!(store.get_text("caption")?, "a cat on a mat");
/// let bytes = store.load_image_bytes("photo").await?;
/// assert_eq!(bytes.len(), 2048);
/// # Ok(())
/// # }
/// ```
pub struct ContextStore {
    config: ContextConfig,
    loaders: LoaderRegistry,
    collection: ReferenceCollection,
    entries: RwLock<HashMap<String, ContextEntry>>,
}

impl ContextStore {
    /// Store with the default loaders (file and base64).
    pub fn new(config: ContextConfig) -> Self {
        Self::with_loaders(config, LoaderRegistry::with_defaults())
    }

    /// Store with a custom loader registry.
    pub fn with_loaders(config: ContextConfig, loaders: LoaderRegistry) -> Self {
        Self::with_metrics(config, loaders, MediaMetrics::new())
    }

    /// Store reporting into an existing metrics collector.
    pub fn with_metrics(
        config: ContextConfig,
        loaders: LoaderRegistry,
        metrics: MediaMetrics,
    ) -> Self {
        tracing::debug!(
            max_memory_bytes = config.max_memory_bytes(),
            loaders = ?loaders,
            "Creating context store"
        );
        let collection = ReferenceCollection::with_metrics(*config.max_memory_bytes(), metrics);
        Self {
            config,
            loaders,
            collection,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The collection holding this store's media.
    pub fn collection(&self) -> &ReferenceCollection {
        &self.collection
    }

    /// Media metrics for this store.
    pub fn metrics(&self) -> &MediaMetrics {
        self.collection.metrics()
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// Store a value, replacing whatever the key held.
    pub fn set(&self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.put(key.into(), ContextEntry::Value(value.into()));
    }

    /// Serialize `value` to JSON and store it.
    ///
    /// # Errors
    ///
    /// Returns a JSON error when `value` cannot be serialized.
    pub fn set_json<T: Serialize>(&self, key: impl Into<String>, value: &T) -> TemperaResult<()> {
        let json = serde_json::to_value(value).map_err(|e| JsonError::new(e.to_string()))?;
        self.set(key, json);
        Ok(())
    }

    /// The value under `key`, if it holds one.
    pub fn get(&self, key: &str) -> Option<ContextValue> {
        match self.read_entries().get(key) {
            Some(ContextEntry::Value(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Boolean under `key`.
    ///
    /// # Errors
    ///
    /// [`ContextErrorKind::KeyNotFound`] or [`ContextErrorKind::TypeMismatch`].
    pub fn get_bool(&self, key: &str) -> TemperaResult<bool> {
        self.typed(key, "bool", ContextValue::as_bool)
    }

    /// Integer under `key`.
    pub fn get_int(&self, key: &str) -> TemperaResult<i64> {
        self.typed(key, "int", ContextValue::as_int)
    }

    /// Number under `key`; integers are widened.
    pub fn get_float(&self, key: &str) -> TemperaResult<f64> {
        self.typed(key, "float", ContextValue::as_float)
    }

    /// Text under `key`.
    pub fn get_text(&self, key: &str) -> TemperaResult<String> {
        self.typed(key, "text", |value| value.as_text().map(str::to_string))
    }

    /// JSON object under `key`.
    pub fn get_object(&self, key: &str) -> TemperaResult<serde_json::Value> {
        self.typed(key, "object", |value| value.as_object().cloned())
    }

    /// Deserialize the value under `key`.
    ///
    /// # Errors
    ///
    /// [`ContextErrorKind::KeyNotFound`], or a JSON error when the value does
    /// not match `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> TemperaResult<T> {
        let json = self.typed(key, "value", |value| Some(value.to_json()))?;
        serde_json::from_value(json).map_err(|e| JsonError::new(e.to_string()).into())
    }

    fn typed<T>(
        &self,
        key: &str,
        expected: &str,
        extract: impl FnOnce(&ContextValue) -> Option<T>,
    ) -> TemperaResult<T> {
        let entries = self.read_entries();
        let value = match entries.get(key) {
            None => {
                return Err(ContextError::new(ContextErrorKind::KeyNotFound(key.to_string())).into());
            }
            Some(ContextEntry::Media(_)) => {
                return Err(mismatch(key, expected, "media").into());
            }
            Some(ContextEntry::Value(value)) => value,
        };
        extract(value).ok_or_else(|| mismatch(key, expected, value.kind_name()).into())
    }

    // ------------------------------------------------------------------
    // Media registration
    // ------------------------------------------------------------------

    /// Register an `http(s)` URL under `key`.
    ///
    /// # Errors
    ///
    /// [`MediaErrorKind::NoLoader`] when no URL loader is registered.
    pub fn set_image_from_url(&self, key: impl Into<String>, url: impl Into<String>) -> TemperaResult<Uuid> {
        self.register_source(key.into(), MediaSource::url(url), None)
    }

    /// Register an object-store object under `key`.
    pub fn set_image_from_object_store(
        &self,
        key: impl Into<String>,
        bucket: &str,
        path: &str,
    ) -> TemperaResult<Uuid> {
        self.register_source(key.into(), MediaSource::object_store(bucket, path), None)
    }

    /// Register a local file under `key`.
    pub fn set_image_from_file(&self, key: impl Into<String>, path: impl Into<String>) -> TemperaResult<Uuid> {
        self.register_source(key.into(), MediaSource::file(path), None)
    }

    /// Register base64 data (raw or a `data:` URL) under `key`.
    pub fn set_image_from_base64(&self, key: impl Into<String>, data: impl Into<String>) -> TemperaResult<Uuid> {
        let data = data.into();
        let mime = data_url_mime(&data);
        self.register_source(key.into(), MediaSource::base64(data), mime)
    }

    /// Register bytes already in memory under `key`.
    ///
    /// # Errors
    ///
    /// [`MediaErrorKind::TooLarge`] above [`ContextConfig::max_inline_bytes`].
    pub fn set_image_from_memory(
        &self,
        key: impl Into<String>,
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> TemperaResult<Uuid> {
        let limit = *self.config.max_inline_bytes();
        if bytes.len() as u64 > limit {
            return Err(MediaError::new(MediaErrorKind::TooLarge {
                size: bytes.len() as u64,
                limit,
            })
            .into());
        }
        let reference = MediaReference::from_memory(bytes, mime_type)
            .with_policy(*self.config.load_error_policy());
        self.register(key.into(), reference)
    }

    fn register_source(
        &self,
        key: String,
        source: MediaSource,
        mime_type: Option<String>,
    ) -> TemperaResult<Uuid> {
        let loader = self.loaders.resolve(source.source_type())?;
        let mut reference =
            MediaReference::new(source, loader).with_policy(*self.config.load_error_policy());
        if let Some(timeout) = self.config.load_timeout() {
            reference = reference.with_load_timeout(timeout);
        }
        if let Some(mime) = mime_type {
            reference = reference.with_mime_type(mime);
        }
        self.register(key, reference)
    }

    fn register(&self, key: String, reference: MediaReference) -> TemperaResult<Uuid> {
        let source = reference.source().display_locator();
        let mut entries = self.write_entries();
        // Release the outgoing reference first so its bytes do not push
        // other keys' media out during the add.
        let previous = match entries.get(&key) {
            Some(ContextEntry::Media(previous)) => Some(*previous),
            _ => None,
        };
        if let Some(previous) = previous {
            self.collection.remove(previous);
        }
        let id = match self.collection.add(Arc::new(reference)) {
            Ok(id) => id,
            Err(err) => {
                // The key must not point at the reference just released.
                if previous.is_some() {
                    entries.remove(&key);
                }
                return Err(err);
            }
        };
        entries.insert(key.clone(), ContextEntry::Media(id));
        tracing::info!(key = %key, %id, source = %source, "Registered media");
        Ok(id)
    }

    fn put(&self, key: String, entry: ContextEntry) {
        let mut entries = self.write_entries();
        if let Some(ContextEntry::Media(previous)) = entries.insert(key, entry) {
            self.collection.remove(previous);
        }
    }

    // ------------------------------------------------------------------
    // Media access
    // ------------------------------------------------------------------

    /// The media reference under `key`.
    ///
    /// # Errors
    ///
    /// [`ContextErrorKind::KeyNotFound`] or [`ContextErrorKind::NotMedia`].
    pub fn image_reference(&self, key: &str) -> TemperaResult<Arc<MediaReference>> {
        let id = self.media_id(key)?;
        self.collection
            .get(id)
            .ok_or_else(|| MediaError::new(MediaErrorKind::NotFound(key.to_string())).into())
    }

    /// Load the bytes of the media under `key`.
    pub async fn load_image_bytes(&self, key: &str) -> TemperaResult<Arc<[u8]>> {
        let id = self.media_id(key)?;
        self.collection.load_bytes(id).await
    }

    /// [`ContextStore::load_image_bytes`] that gives up when `cancel` fires.
    pub async fn load_image_bytes_with(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> TemperaResult<Arc<[u8]>> {
        let id = self.media_id(key)?;
        self.collection.load_bytes_with(id, cancel).await
    }

    /// The media under `key` as a `data:` URL.
    ///
    /// Base64 sources are formatted without loading.
    pub async fn get_image_data_url(&self, key: &str) -> TemperaResult<String> {
        let reference = self.image_reference(key)?;
        if reference.source().source_type() != SourceType::Base64 {
            self.collection.load_bytes(reference.id()).await?;
        }
        reference.get_data_url().await
    }

    /// Cached media bytes charged against the ceiling.
    pub fn memory_usage(&self) -> u64 {
        self.collection.memory_usage()
    }

    /// Drop the cached bytes of the media under `key`.
    pub fn evict_image_cache(&self, key: &str) -> TemperaResult<u64> {
        let id = self.media_id(key)?;
        self.collection.evict(id)
    }

    /// Drop all cached media bytes.
    pub fn evict_all_image_cache(&self) -> u64 {
        self.collection.evict_all()
    }

    // ------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------

    /// Remove `key`, releasing its media. Returns whether the key existed.
    pub fn delete(&self, key: &str) -> bool {
        let mut entries = self.write_entries();
        match entries.remove(key) {
            Some(ContextEntry::Media(id)) => {
                self.collection.remove(id);
                true
            }
            Some(ContextEntry::Value(_)) => true,
            None => false,
        }
    }

    /// Remove every key and release all media.
    pub fn clear(&self) {
        let mut entries = self.write_entries();
        entries.clear();
        self.collection.clear();
    }

    /// Entry under `key`.
    pub fn entry(&self, key: &str) -> Option<ContextEntry> {
        self.read_entries().get(key).cloned()
    }

    /// Whether `key` exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.read_entries().contains_key(key)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read_entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys holding media, sorted.
    pub fn media_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .read_entries()
            .iter()
            .filter(|(_, entry)| matches!(entry, ContextEntry::Media(_)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    fn media_id(&self, key: &str) -> TemperaResult<Uuid> {
        match self.read_entries().get(key) {
            Some(ContextEntry::Media(id)) => Ok(*id),
            Some(ContextEntry::Value(_)) => {
                Err(ContextError::new(ContextErrorKind::NotMedia(key.to_string())).into())
            }
            None => Err(ContextError::new(ContextErrorKind::KeyNotFound(key.to_string())).into()),
        }
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, ContextEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, ContextEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

impl Drop for ContextStore {
    fn drop(&mut self) {
        self.collection.clear();
    }
}

impl std::fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextStore")
            .field("keys", &self.len())
            .field("collection", &self.collection)
            .finish()
    }
}

#[track_caller]
fn mismatch(key: &str, expected: &str, actual: &str) -> ContextError {
    ContextError::new(ContextErrorKind::TypeMismatch {
        key: key.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    })
}

/// MIME type declared by a `data:` URL header.
fn data_url_mime(data: &str) -> Option<String> {
    let header = data.trim().strip_prefix("data:")?.split(',').next()?;
    let mime = header.split(';').next()?.trim();
    (!mime.is_empty()).then(|| mime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_mime_reads_header() {
        assert_eq!(
            data_url_mime("data:image/webp;base64,AAAA").as_deref(),
            Some("image/webp")
        );
        assert_eq!(data_url_mime("AAAA"), None);
        assert_eq!(data_url_mime("data:;base64,AAAA"), None);
    }
}

//! Loader trait definition and registry.

use std::collections::HashMap;
use std::sync::Arc;
use tempera_core::{MediaSource, SourceType};
use tempera_error::{MediaError, MediaErrorKind};

/// Bytes and whatever metadata the loader learned while fetching them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedMedia {
    /// Raw payload
    pub bytes: Vec<u8>,
    /// MIME type reported by the source, if any
    pub mime_type: Option<String>,
    /// Pixel width, if known
    pub width: Option<u32>,
    /// Pixel height, if known
    pub height: Option<u32>,
    /// Source-specific metadata (ETag, content disposition, ...)
    pub metadata: HashMap<String, String>,
}

impl LoadedMedia {
    /// Wrap raw bytes with no extra metadata.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            ..Default::default()
        }
    }

    /// Attach a MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Attach one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Trait for pluggable media loaders.
///
/// A loader fetches the raw bytes for one source descriptor. Implementations
/// must be safe to call concurrently for different references; the
/// [`MediaReference`](crate::MediaReference) guarantees at most one
/// in-flight call per reference.
///
/// Failures are returned as [`MediaError`] so a reference can memoize them.
#[async_trait::async_trait]
pub trait Loader: Send + Sync {
    /// Short name used in logs and error messages (e.g. "url", "file").
    fn name(&self) -> &str;

    /// Fetch the payload for `source`.
    async fn load(&self, source: &MediaSource) -> Result<LoadedMedia, MediaError>;
}

/// Source type to loader table.
///
/// The context store picks the loader for a new reference from here. File and
/// base64 loaders are registered by [`LoaderRegistry::with_defaults`]; URL and
/// object-store loaders need a host transport and are added explicitly.
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: HashMap<SourceType, Arc<dyn Loader>>,
}

impl LoaderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the loaders that need no host transport.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SourceType::File, Arc::new(crate::FileLoader::new()));
        registry.register(SourceType::Base64, Arc::new(crate::Base64Loader));
        registry
    }

    /// Register (or replace) the loader for a source type.
    pub fn register(&mut self, source_type: SourceType, loader: Arc<dyn Loader>) {
        tracing::debug!(%source_type, loader = loader.name(), "Registered loader");
        self.loaders.insert(source_type, loader);
    }

    /// Builder-style [`LoaderRegistry::register`].
    pub fn with_loader(mut self, source_type: SourceType, loader: Arc<dyn Loader>) -> Self {
        self.register(source_type, loader);
        self
    }

    /// Loader for a source type.
    ///
    /// # Errors
    ///
    /// Returns [`MediaErrorKind::NoLoader`] when nothing is registered.
    pub fn resolve(&self, source_type: SourceType) -> Result<Arc<dyn Loader>, MediaError> {
        self.loaders
            .get(&source_type)
            .cloned()
            .ok_or_else(|| MediaError::new(MediaErrorKind::NoLoader(source_type.to_string())))
    }

    /// Whether a loader is registered for the source type.
    pub fn supports(&self, source_type: SourceType) -> bool {
        self.loaders.contains_key(&source_type)
    }
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self
            .loaders
            .iter()
            .map(|(source_type, loader)| format!("{}={}", source_type, loader.name()))
            .collect();
        names.sort();
        f.debug_struct("LoaderRegistry")
            .field("loaders", &names)
            .finish()
    }
}

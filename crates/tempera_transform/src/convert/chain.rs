//! Converter selection and conversion caching.

use super::{
    Base64Converter, ConversionOutput, ConversionTarget, Converter, DownloadConverter,
    ImageConverter, UrlConverter,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempera_cache::{CacheConfig, Fingerprint, TtlCache};
use tempera_error::{ConversionError, ConversionErrorKind, TemperaResult};
use tempera_storage::MediaReference;

/// Ordered set of converters plus a TTL cache of their outputs.
///
/// # Example
///
/// ```rust
/// use tempera_cache::CacheConfig;
/// use tempera_storage::MediaReference;
/// use tempera_transform::{ConversionTarget, ConverterChain};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let chain = ConverterChain::with_defaults(CacheConfig::default());
/// let reference = MediaReference::from_memory(b"hi".to_vec(), "text/plain");
///
/// let output = chain.convert(&reference, ConversionTarget::DataUrl).await?;
/// assert_eq!(output.as_text(), Some("data:text/plain;base64,aGk="));
/// # Ok(())
/// # }
/// ```
pub struct ConverterChain {
    converters: Vec<Arc<dyn Converter>>,
    cache: Mutex<TtlCache<String, ConversionOutput>>,
}

impl ConverterChain {
    /// Chain with no converters.
    pub fn new(cache_config: CacheConfig) -> Self {
        Self {
            converters: Vec::new(),
            cache: Mutex::new(TtlCache::new(cache_config)),
        }
    }

    /// Chain with the base64, URL, image, and download converters.
    pub fn with_defaults(cache_config: CacheConfig) -> Self {
        let mut chain = Self::new(cache_config);
        chain.register(Arc::new(Base64Converter));
        chain.register(Arc::new(UrlConverter));
        chain.register(Arc::new(ImageConverter));
        chain.register(Arc::new(DownloadConverter));
        chain
    }

    /// Append a converter. Earlier registrations win score ties.
    pub fn register(&mut self, converter: Arc<dyn Converter>) {
        tracing::debug!(converter = converter.name(), "Registered converter");
        self.converters.push(converter);
    }

    /// Names of registered converters in registration order.
    pub fn converter_names(&self) -> Vec<String> {
        self.converters.iter().map(|c| c.name().to_string()).collect()
    }

    /// The highest scoring converter that accepts the request.
    pub fn find_converter(
        &self,
        source: &MediaReference,
        target: ConversionTarget,
    ) -> Option<Arc<dyn Converter>> {
        let mut best: Option<(u32, &Arc<dyn Converter>)> = None;
        for converter in &self.converters {
            if !converter.can_convert(source, target) {
                continue;
            }
            let score = converter.score(source, target);
            if best.is_none_or(|(top, _)| score > top) {
                best = Some((score, converter));
            }
        }
        best.map(|(score, converter)| {
            tracing::debug!(converter = converter.name(), score, %target, "Selected converter");
            Arc::clone(converter)
        })
    }

    /// Convert `source` to `target`, serving repeated requests from the cache.
    ///
    /// # Errors
    ///
    /// [`ConversionErrorKind::NoConverter`] when nothing accepts the request,
    /// otherwise whatever the selected converter returns.
    #[tracing::instrument(skip(self, source), fields(id = %source.id(), source = %source.source()))]
    pub async fn convert(
        &self,
        source: &MediaReference,
        target: ConversionTarget,
    ) -> TemperaResult<ConversionOutput> {
        let key = Fingerprint::new("convert")
            .part(source.id().as_bytes())
            .part(source.mime_type())
            .part(target.to_string())
            .finish();

        if let Some(hit) = self.lock_cache().get(&key) {
            tracing::debug!("Conversion cache hit");
            return Ok(hit);
        }

        let converter = self.find_converter(source, target).ok_or_else(|| {
            ConversionError::new(ConversionErrorKind::NoConverter {
                origin: source.source().to_string(),
                target: target.to_string(),
            })
        })?;

        let output = converter.convert(source, target).await?;
        self.lock_cache().insert(key, output.clone(), None);
        Ok(output)
    }

    /// Drop every cached conversion.
    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    /// Number of cached conversions.
    pub fn cache_len(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> MutexGuard<'_, TtlCache<String, ConversionOutput>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ConverterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterChain")
            .field("converters", &self.converter_names())
            .field("cached", &self.cache_len())
            .finish()
    }
}

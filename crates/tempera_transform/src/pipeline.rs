//! Strategy-driven resize pipeline with result caching.

use crate::{ImageTransformer, RasterTransformer, ResizeConfig, ResizeStats, ResizeStrategy};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tempera_cache::{Fingerprint, TtlCache};
use tempera_core::ImageFormat;
use tempera_error::TemperaResult;
use tempera_storage::{MediaReference, ReferenceCollection, sniff_dimensions};
use uuid::Uuid;

/// Output of one resize request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeResult {
    /// Output bytes (the input itself when nothing was done)
    pub bytes: Arc<[u8]>,
    /// MIME type of `bytes`
    pub mime_type: String,
    /// Format of `bytes`, when it is a known raster format
    pub format: Option<ImageFormat>,
    /// Input size in kilobytes
    pub original_size_kb: f64,
    /// Output size in kilobytes
    pub resized_size_kb: f64,
    /// Output width, when known
    pub width: Option<u32>,
    /// Output height, when known
    pub height: Option<u32>,
    /// Time spent producing this result
    pub processing_time: Duration,
    /// Strategy that was applied
    pub strategy_name: String,
    /// Served from the result cache
    pub cache_hit: bool,
    /// The transformer ran (false for pass-through)
    pub resized: bool,
}

impl ResizeResult {
    fn passthrough(bytes: Arc<[u8]>, mime_type: &str, strategy_name: &str, started: Instant) -> Self {
        let size_kb = kilobytes(bytes.len());
        let dimensions = sniff_dimensions(&bytes);
        Self {
            mime_type: mime_type.to_string(),
            format: ImageFormat::from_mime(mime_type),
            original_size_kb: size_kb,
            resized_size_kb: size_kb,
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
            processing_time: started.elapsed(),
            strategy_name: strategy_name.to_string(),
            cache_hit: false,
            resized: false,
            bytes,
        }
    }
}

fn kilobytes(len: usize) -> f64 {
    len as f64 / 1024.0
}

pub(crate) struct PipelineInner {
    pub(crate) config: ResizeConfig,
    transformer: Arc<dyn ImageTransformer>,
    cache: Mutex<TtlCache<String, ResizeResult>>,
    stats: Mutex<ResizeStats>,
}

/// Resizes images according to per-consumer strategies.
///
/// Results are cached by content and strategy parameters. Cloning is cheap
/// and clones share the cache and statistics, which is how batch workers
/// reach the pipeline.
///
/// # Example
///
/// ```rust,no_run
/// use tempera_transform::{ResizeConfig, ResizePipeline};
///
/// # async fn example(photo: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = ResizePipeline::new(ResizeConfig::default());
/// let result = pipeline.resize_single(photo, "image/jpeg", "vision.describe").await?;
/// println!("{} -> {:.1}KB via {}", result.original_size_kb, result.resized_size_kb, result.strategy_name);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ResizePipeline {
    pub(crate) inner: Arc<PipelineInner>,
}

impl ResizePipeline {
    /// Pipeline using the `image`-backed [`RasterTransformer`].
    pub fn new(config: ResizeConfig) -> Self {
        Self::with_transformer(config, Arc::new(RasterTransformer))
    }

    /// Pipeline using a custom transformer.
    pub fn with_transformer(config: ResizeConfig, transformer: Arc<dyn ImageTransformer>) -> Self {
        tracing::debug!(
            enabled = config.enabled,
            strategies = config.strategies.len(),
            transformer = transformer.name(),
            "Creating resize pipeline"
        );
        let cache = TtlCache::new(config.cache.clone());
        Self {
            inner: Arc::new(PipelineInner {
                config,
                transformer,
                cache: Mutex::new(cache),
                stats: Mutex::new(ResizeStats::default()),
            }),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ResizeConfig {
        &self.inner.config
    }

    /// Resize one image for `consumer_key`.
    ///
    /// Returns the input unchanged when resizing is disabled or the input is
    /// already within the strategy's size limit; such results are not cached.
    ///
    /// # Errors
    ///
    /// Decode and encode failures are returned, never replaced by the input.
    #[tracing::instrument(skip(self, bytes))]
    pub async fn resize_single(
        &self,
        bytes: impl Into<Arc<[u8]>>,
        mime_type: &str,
        consumer_key: &str,
    ) -> TemperaResult<ResizeResult> {
        let started = Instant::now();
        let bytes: Arc<[u8]> = bytes.into();

        if !self.inner.config.enabled {
            self.lock_stats().record_passthrough();
            return Ok(ResizeResult::passthrough(bytes, mime_type, "disabled", started));
        }

        let strategy = self.inner.config.resolve_strategy(consumer_key);
        if !strategy.enabled {
            tracing::debug!(strategy = %strategy.name, "Strategy disabled, passing through");
            self.lock_stats().record_passthrough();
            return Ok(ResizeResult::passthrough(bytes, mime_type, &strategy.name, started));
        }

        let key = cache_key(&bytes, &strategy);
        if let Some(mut hit) = self.lock_cache().get(&key) {
            tracing::debug!(strategy = %strategy.name, "Resize cache hit");
            self.lock_stats().record_cache_hit();
            hit.cache_hit = true;
            return Ok(hit);
        }

        if bytes.len() as u64 <= strategy.max_file_size_bytes() {
            tracing::debug!(
                size = bytes.len(),
                limit = strategy.max_file_size_bytes(),
                "Input within size limit, passing through"
            );
            self.lock_stats().record_passthrough();
            return Ok(ResizeResult::passthrough(bytes, mime_type, &strategy.name, started));
        }

        let original_size_kb = kilobytes(bytes.len());
        let output = match self.inner.transformer.transform(bytes, &strategy).await {
            Ok(output) => output,
            Err(err) => {
                self.lock_stats().record_error();
                tracing::warn!(strategy = %strategy.name, error = %err, "Resize failed");
                return Err(err.into());
            }
        };

        let processing_time = started.elapsed();
        let result = ResizeResult {
            mime_type: output.format.mime_type().to_string(),
            format: Some(output.format),
            original_size_kb,
            resized_size_kb: kilobytes(output.bytes.len()),
            width: Some(output.width),
            height: Some(output.height),
            processing_time,
            strategy_name: strategy.name.clone(),
            cache_hit: false,
            resized: true,
            bytes: output.bytes.into(),
        };

        self.lock_cache().insert(key, result.clone(), None);
        self.lock_stats()
            .record_resize(original_size_kb, result.resized_size_kb, processing_time);

        tracing::info!(
            strategy = %result.strategy_name,
            original_kb = result.original_size_kb,
            resized_kb = result.resized_size_kb,
            width = output.width,
            height = output.height,
            elapsed_ms = processing_time.as_millis() as u64,
            "Resized image"
        );
        Ok(result)
    }

    /// Load a standalone media reference and resize its bytes.
    ///
    /// The load bypasses any [`ReferenceCollection`]; use
    /// [`ResizePipeline::resize_collected`] for references a collection
    /// tracks, so the bytes count against its ceiling.
    ///
    /// # Errors
    ///
    /// Returns the reference's load error or the resize error.
    pub async fn resize_reference(
        &self,
        reference: &MediaReference,
        consumer_key: &str,
    ) -> TemperaResult<ResizeResult> {
        let bytes = reference.get_bytes().await?;
        let mime_type = reference.metadata().mime_or_default().to_string();
        self.resize_single(bytes, &mime_type, consumer_key).await
    }

    /// Load a reference through `collection` and resize its bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MediaErrorKind::NotFound`](tempera_storage::MediaErrorKind::NotFound)
    /// for an unknown ID, the load error, or the resize error.
    pub async fn resize_collected(
        &self,
        collection: &ReferenceCollection,
        id: Uuid,
        consumer_key: &str,
    ) -> TemperaResult<ResizeResult> {
        let bytes = collection.load_bytes(id).await?;
        let mime_type = collection
            .get(id)
            .map(|reference| reference.metadata().mime_or_default().to_string())
            .unwrap_or_default();
        self.resize_single(bytes, &mime_type, consumer_key).await
    }

    /// Copy of the current statistics.
    pub fn stats(&self) -> ResizeStats {
        self.lock_stats().clone()
    }

    /// Zero all statistics.
    pub fn reset_stats(&self) {
        *self.lock_stats() = ResizeStats::default();
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.lock_cache().clear();
        tracing::debug!("Cleared resize cache");
    }

    /// Number of cached results.
    pub fn cache_len(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> MutexGuard<'_, TtlCache<String, ResizeResult>> {
        self.inner.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_stats(&self) -> MutexGuard<'_, ResizeStats> {
        self.inner.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ResizePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResizePipeline")
            .field("enabled", &self.inner.config.enabled)
            .field("transformer", &self.inner.transformer.name())
            .field("cache_len", &self.cache_len())
            .finish()
    }
}

/// Cache key over the content and every parameter that affects the output.
fn cache_key(bytes: &[u8], strategy: &ResizeStrategy) -> String {
    let sigma = |value: Option<f32>| value.map(f32::to_bits).unwrap_or(0).to_le_bytes();
    Fingerprint::new("resize")
        .part(bytes)
        .part(strategy.max_width.to_le_bytes())
        .part(strategy.max_height.to_le_bytes())
        .part([strategy.quality, strategy.crop_to_fill as u8])
        .part(strategy.target_format.to_string())
        .part(strategy.interpolation.to_string())
        .part(sigma(strategy.sharpening))
        .part(sigma(strategy.noise_reduction))
        .finish()
}

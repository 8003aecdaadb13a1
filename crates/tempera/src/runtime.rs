//! Shared services for a host application.

use crate::TemperaConfig;
use std::sync::Arc;
use tempera_context::ContextStore;
use tempera_error::TemperaResult;
use tempera_storage::{LoaderRegistry, MediaMetrics};
use tempera_transform::{
    ConversionOutput, ConversionTarget, ConverterChain, ResizePipeline, ResizeResult,
};

/// Process-wide media services.
///
/// One `Tempera` owns the resize pipeline, the converter chain, the loader
/// registry handed to every new context store, and the metrics collector
/// those stores report into. Workflow executions each get their own
/// [`ContextStore`] from [`Tempera::context_store`].
///
/// # Example
///
/// ```rust,no_run
/// use tempera::{Tempera, TemperaConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let tempera = Tempera::new(TemperaConfig::load()?)?;
/// let store = tempera.context_store();
/// store.set_image_from_file("photo", "assets/cat.jpg")?;
///
/// let resized = tempera.resize_image(&store, "photo", "vision.describe").await?;
/// println!("{} KB via {}", resized.resized_size_kb, resized.strategy_name);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Tempera {
    config: Arc<TemperaConfig>,
    pipeline: ResizePipeline,
    converters: Arc<ConverterChain>,
    loaders: LoaderRegistry,
    metrics: MediaMetrics,
}

impl Tempera {
    /// Services with the default loaders (file and base64).
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `config` fails validation.
    pub fn new(config: TemperaConfig) -> TemperaResult<Self> {
        Self::with_loaders(config, LoaderRegistry::with_defaults())
    }

    /// Services with a host-supplied loader registry, typically adding URL
    /// and object-store loaders.
    pub fn with_loaders(config: TemperaConfig, loaders: LoaderRegistry) -> TemperaResult<Self> {
        config.validate()?;
        let pipeline = ResizePipeline::new(config.resize.clone());
        let converters = Arc::new(ConverterChain::with_defaults(config.conversion.clone()));
        tracing::info!(
            loaders = ?loaders,
            converters = ?converters.converter_names(),
            "Tempera services ready"
        );
        Ok(Self {
            config: Arc::new(config),
            pipeline,
            converters,
            loaders,
            metrics: MediaMetrics::new(),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &TemperaConfig {
        &self.config
    }

    /// The shared resize pipeline.
    pub fn pipeline(&self) -> &ResizePipeline {
        &self.pipeline
    }

    /// The shared converter chain.
    pub fn converters(&self) -> &ConverterChain {
        &self.converters
    }

    /// Metrics aggregated across every store created here.
    pub fn metrics(&self) -> &MediaMetrics {
        &self.metrics
    }

    /// A fresh store for one workflow execution.
    pub fn context_store(&self) -> ContextStore {
        ContextStore::with_metrics(
            self.config.context.clone(),
            self.loaders.clone(),
            self.metrics.clone(),
        )
    }

    /// Resize the media under `key` for `consumer_key`.
    ///
    /// Bytes are loaded through the store so they count against its memory
    /// ceiling.
    pub async fn resize_image(
        &self,
        store: &ContextStore,
        key: &str,
        consumer_key: &str,
    ) -> TemperaResult<ResizeResult> {
        let bytes = store.load_image_bytes(key).await?;
        let mime_type = store.image_reference(key)?.mime_type();
        self.pipeline
            .resize_single(bytes, &mime_type, consumer_key)
            .await
    }

    /// Convert the media under `key` to `target`.
    ///
    /// Targets that read the payload load it through the store first, so the
    /// bytes count against its memory ceiling.
    pub async fn convert_image(
        &self,
        store: &ContextStore,
        key: &str,
        target: ConversionTarget,
    ) -> TemperaResult<ConversionOutput> {
        let reference = store.image_reference(key)?;
        if target != ConversionTarget::Url {
            store.load_image_bytes(key).await?;
        }
        self.converters.convert(&reference, target).await
    }
}

impl std::fmt::Debug for Tempera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tempera")
            .field("loaders", &self.loaders)
            .field("converters", &self.converters.converter_names())
            .field("resize_cache", &self.pipeline.cache_len())
            .finish()
    }
}

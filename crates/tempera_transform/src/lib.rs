//! Image resizing and format conversion for Tempera.
//!
//! # Resizing
//!
//! [`ResizePipeline`] resolves a [`ResizeStrategy`] per consumer key, skips
//! inputs that are already small enough, and otherwise decodes, scales,
//! filters, and re-encodes them through an [`ImageTransformer`]. Results are
//! cached by content fingerprint and strategy parameters, and running
//! [`ResizeStats`] are kept per pipeline.
//!
//! Batches ([`ResizePipeline::resize_batch`]) run sequentially or on a
//! semaphore-bounded worker pool and isolate per-item failures.
//!
//! # Conversion
//!
//! [`ConverterChain`] picks the highest scoring [`Converter`] for a
//! reference and a [`ConversionTarget`] and caches the output.
//!
//! # Example
//!
//! ```rust,no_run
//! use tempera_transform::{ImageInput, ResizeBatchRequest, ResizeConfig, ResizePipeline};
//!
//! # async fn example(front: Vec<u8>, back: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = ResizePipeline::new(ResizeConfig::default().with_consumer("gallery", "thumbnail"));
//!
//! let batch = pipeline
//!     .resize_batch(
//!         ResizeBatchRequest::new("gallery")
//!             .with_image("front", ImageInput::new(front, "image/jpeg"))
//!             .with_image("back", ImageInput::new(back, "image/jpeg"))
//!             .with_parallel(true),
//!     )
//!     .await?;
//!
//! if let Some(err) = batch.aggregate_error() {
//!     eprintln!("{}", err);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod convert;
mod pipeline;
mod stats;
mod strategy;
mod transformer;

pub use batch::{BatchProgress, BatchResize, ImageInput, ResizeBatchRequest};
pub use config::ResizeConfig;
pub use convert::{
    Base64Converter, ConversionOutput, ConversionTarget, Converter, ConverterChain,
    DownloadConverter, ImageConverter, UrlConverter,
};
pub use pipeline::{ResizePipeline, ResizeResult};
pub use stats::ResizeStats;
pub use strategy::{Interpolation, ResizeStrategy, ResizeStrategyBuilder};
pub use transformer::{ImageTransformer, RasterTransformer, TransformOutput, transform_blocking};

pub use tempera_error::{ConversionError, ConversionErrorKind, ResizeError, ResizeErrorKind};

//! Image decode, resize, and encode.

use crate::ResizeStrategy;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;
use std::sync::Arc;
use tempera_core::ImageFormat;
use tempera_error::{ResizeError, ResizeErrorKind};

/// Unsharp-mask threshold paired with [`ResizeStrategy::sharpening`].
const SHARPEN_THRESHOLD: i32 = 2;

/// Encoded output of one transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    /// Encoded bytes
    pub bytes: Vec<u8>,
    /// Output format
    pub format: ImageFormat,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
}

/// Turns encoded image bytes into a resized, re-encoded variant.
///
/// The pipeline calls this once per cache miss. Implementations decide where
/// the CPU work runs; [`RasterTransformer`] moves it to the blocking pool.
#[async_trait::async_trait]
pub trait ImageTransformer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Apply `strategy` to `input`.
    async fn transform(
        &self,
        input: Arc<[u8]>,
        strategy: &ResizeStrategy,
    ) -> Result<TransformOutput, ResizeError>;
}

/// [`ImageTransformer`] backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterTransformer;

#[async_trait::async_trait]
impl ImageTransformer for RasterTransformer {
    fn name(&self) -> &str {
        "raster"
    }

    async fn transform(
        &self,
        input: Arc<[u8]>,
        strategy: &ResizeStrategy,
    ) -> Result<TransformOutput, ResizeError> {
        let strategy = strategy.clone();
        tokio::task::spawn_blocking(move || transform_blocking(&input, &strategy))
            .await
            .map_err(|e| ResizeError::new(ResizeErrorKind::Worker(e.to_string())))?
    }
}

/// Decode, scale, filter, and encode on the current thread.
pub fn transform_blocking(
    input: &[u8],
    strategy: &ResizeStrategy,
) -> Result<TransformOutput, ResizeError> {
    let image = decode(input)?;
    let (width, height) = image.dimensions();
    let filter = strategy.interpolation.filter();

    let mut image = if strategy.fits(width, height) {
        image
    } else if strategy.crop_to_fill {
        // Both target sides are clamped to the source, so this never upscales.
        image.resize_to_fill(
            strategy.max_width.min(width),
            strategy.max_height.min(height),
            filter,
        )
    } else {
        image.resize(strategy.max_width, strategy.max_height, filter)
    };

    if let Some(sigma) = strategy.noise_reduction {
        image = image.blur(sigma);
    }
    if let Some(sigma) = strategy.sharpening {
        image = image.unsharpen(sigma, SHARPEN_THRESHOLD);
    }

    let (out_width, out_height) = image.dimensions();
    let bytes = encode(&image, strategy.target_format, strategy.quality)?;

    tracing::debug!(
        from = %format!("{}x{}", width, height),
        to = %format!("{}x{}", out_width, out_height),
        format = %strategy.target_format,
        size = bytes.len(),
        "Transformed image"
    );

    Ok(TransformOutput {
        bytes,
        format: strategy.target_format,
        width: out_width,
        height: out_height,
    })
}

/// Decode any format the `image` crate recognizes.
pub(crate) fn decode(input: &[u8]) -> Result<DynamicImage, ResizeError> {
    image::load_from_memory(input)
        .map_err(|e| ResizeError::new(ResizeErrorKind::Decode(e.to_string())))
}

/// Encode `image` as `format`; `quality` applies to JPEG only.
pub(crate) fn encode(
    image: &DynamicImage,
    format: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, ResizeError> {
    let mut out = Vec::new();
    let result = match format {
        ImageFormat::Jpeg => image
            .to_rgb8()
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))),
        ImageFormat::Png => image.to_rgba8().write_with_encoder(PngEncoder::new(&mut out)),
        ImageFormat::Webp => image
            .to_rgba8()
            .write_with_encoder(WebPEncoder::new_lossless(&mut out)),
        ImageFormat::Gif => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Gif),
    };
    result.map_err(|e| ResizeError::new(ResizeErrorKind::Encode(e.to_string())))?;
    Ok(out)
}

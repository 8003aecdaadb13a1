//! Built-in converters.

use super::{ConversionOutput, ConversionTarget, Converter};
use crate::transformer::{decode, encode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tempera_core::{ImageFormat, MediaType, SourceType};
use tempera_error::{ConversionError, ConversionErrorKind, ResizeError, ResizeErrorKind, TemperaResult};
use tempera_storage::MediaReference;

/// Quality used when re-encoding to a lossy format.
const CONVERSION_QUALITY: u8 = 90;

#[track_caller]
fn unsupported(converter: &str, target: ConversionTarget) -> ConversionError {
    ConversionError::new(ConversionErrorKind::Unsupported {
        converter: converter.to_string(),
        target: target.to_string(),
    })
}

/// Produces base64 text and data URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Converter;

#[async_trait::async_trait]
impl Converter for Base64Converter {
    fn name(&self) -> &str {
        "base64"
    }

    fn can_convert(&self, _source: &MediaReference, target: ConversionTarget) -> bool {
        matches!(target, ConversionTarget::Base64 | ConversionTarget::DataUrl)
    }

    fn score(&self, source: &MediaReference, _target: ConversionTarget) -> u32 {
        if source.is_cached() || source.source().source_type() == SourceType::Base64 {
            100
        } else {
            95
        }
    }

    async fn convert(
        &self,
        source: &MediaReference,
        target: ConversionTarget,
    ) -> TemperaResult<ConversionOutput> {
        match target {
            ConversionTarget::DataUrl => Ok(ConversionOutput::Text(source.get_data_url().await?)),
            ConversionTarget::Base64 => {
                let locator = source.source().locator().trim();
                if source.source().source_type() == SourceType::Base64
                    && !locator.starts_with("data:")
                {
                    return Ok(ConversionOutput::Text(locator.to_string()));
                }
                let bytes = source.get_bytes().await?;
                Ok(ConversionOutput::Text(STANDARD.encode(&bytes)))
            }
            other => Err(unsupported(self.name(), other).into()),
        }
    }
}

/// Hands out URL locators and materializes URL sources as bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlConverter;

#[async_trait::async_trait]
impl Converter for UrlConverter {
    fn name(&self) -> &str {
        "url"
    }

    fn can_convert(&self, source: &MediaReference, target: ConversionTarget) -> bool {
        source.source().source_type() == SourceType::Url
            && matches!(target, ConversionTarget::Url | ConversionTarget::Bytes)
    }

    fn score(&self, _source: &MediaReference, target: ConversionTarget) -> u32 {
        match target {
            ConversionTarget::Url => 90,
            _ => 40,
        }
    }

    async fn convert(
        &self,
        source: &MediaReference,
        target: ConversionTarget,
    ) -> TemperaResult<ConversionOutput> {
        match target {
            ConversionTarget::Url => Ok(ConversionOutput::Text(source.source().locator().to_string())),
            ConversionTarget::Bytes => Ok(ConversionOutput::Bytes {
                bytes: source.get_bytes().await?,
                mime_type: source.metadata().mime_or_default().to_string(),
            }),
            other => Err(unsupported(self.name(), other).into()),
        }
    }
}

/// Decodes and re-encodes images into another raster format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageConverter;

#[async_trait::async_trait]
impl Converter for ImageConverter {
    fn name(&self) -> &str {
        "image"
    }

    fn can_convert(&self, source: &MediaReference, target: ConversionTarget) -> bool {
        let metadata = source.metadata();
        matches!(target, ConversionTarget::Image(_))
            && (metadata.mime_type.is_empty() || metadata.media_type() == MediaType::Image)
    }

    fn score(&self, source: &MediaReference, target: ConversionTarget) -> u32 {
        match target {
            ConversionTarget::Image(format)
                if ImageFormat::from_mime(&source.mime_type()) == Some(format) =>
            {
                85
            }
            _ => 80,
        }
    }

    async fn convert(
        &self,
        source: &MediaReference,
        target: ConversionTarget,
    ) -> TemperaResult<ConversionOutput> {
        let ConversionTarget::Image(format) = target else {
            return Err(unsupported(self.name(), target).into());
        };
        let bytes = source.get_bytes().await?;
        let encoded = tokio::task::spawn_blocking(move || {
            let image = decode(&bytes)?;
            encode(&image, format, CONVERSION_QUALITY)
        })
        .await
        .map_err(|e| ResizeError::new(ResizeErrorKind::Worker(e.to_string())))??;

        Ok(ConversionOutput::Bytes {
            bytes: encoded.into(),
            mime_type: format.mime_type().to_string(),
        })
    }
}

/// Reads a source into bytes.
///
/// Remote sources are its main job; local and inline sources route here
/// at a low score so `Bytes` is reachable for every source type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadConverter;

#[async_trait::async_trait]
impl Converter for DownloadConverter {
    fn name(&self) -> &str {
        "download"
    }

    fn can_convert(&self, _source: &MediaReference, target: ConversionTarget) -> bool {
        target == ConversionTarget::Bytes
    }

    fn score(&self, source: &MediaReference, _target: ConversionTarget) -> u32 {
        match (source.source().source_type().is_remote(), source.is_cached()) {
            (true, false) => 70,
            (true, true) => 20,
            (false, _) => 10,
        }
    }

    async fn convert(
        &self,
        source: &MediaReference,
        target: ConversionTarget,
    ) -> TemperaResult<ConversionOutput> {
        if target != ConversionTarget::Bytes {
            return Err(unsupported(self.name(), target).into());
        }
        let bytes = source.get_bytes().await?;
        tracing::debug!(source = %source.source(), size = bytes.len(), "Downloaded source");
        Ok(ConversionOutput::Bytes {
            bytes,
            mime_type: source.metadata().mime_or_default().to_string(),
        })
    }
}

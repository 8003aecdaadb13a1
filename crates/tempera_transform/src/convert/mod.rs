//! Format converters and the scoring chain that selects between them.

mod chain;
mod converters;

pub use chain::ConverterChain;
pub use converters::{Base64Converter, DownloadConverter, ImageConverter, UrlConverter};

use std::sync::Arc;
use tempera_core::ImageFormat;
use tempera_error::TemperaResult;
use tempera_storage::MediaReference;

/// What a conversion should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ConversionTarget {
    /// Raw base64 text
    #[display("base64")]
    Base64,
    /// `data:<mime>;base64,...` URL
    #[display("data_url")]
    DataUrl,
    /// A fetchable URL
    #[display("url")]
    Url,
    /// Raw bytes
    #[display("bytes")]
    Bytes,
    /// Re-encoded image
    #[display("image/{}", _0)]
    Image(ImageFormat),
}

/// Result of a conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutput {
    /// Textual output (base64, data URL, URL)
    Text(String),
    /// Binary output
    Bytes {
        /// Payload
        bytes: Arc<[u8]>,
        /// MIME type of the payload
        mime_type: String,
    },
}

impl ConversionOutput {
    /// The text, if this is textual output.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConversionOutput::Text(text) => Some(text),
            ConversionOutput::Bytes { .. } => None,
        }
    }

    /// The bytes, if this is binary output.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ConversionOutput::Bytes { bytes, .. } => Some(bytes),
            ConversionOutput::Text(_) => None,
        }
    }
}

/// A single conversion route.
///
/// The chain asks every converter whether it can handle a request, then runs
/// the one with the highest [`Converter::score`].
#[async_trait::async_trait]
pub trait Converter: Send + Sync {
    /// Short name for logs and errors.
    fn name(&self) -> &str;

    /// Whether this converter handles `source` to `target`.
    fn can_convert(&self, source: &MediaReference, target: ConversionTarget) -> bool;

    /// Preference for this route; higher wins.
    fn score(&self, source: &MediaReference, target: ConversionTarget) -> u32;

    /// Run the conversion.
    async fn convert(
        &self,
        source: &MediaReference,
        target: ConversionTarget,
    ) -> TemperaResult<ConversionOutput>;
}

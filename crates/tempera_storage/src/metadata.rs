//! Media metadata types.

use std::collections::HashMap;
use tempera_core::MediaType;

/// Metadata about a referenced payload.
///
/// `size_bytes` stays 0 until the payload is loaded unless the size is known
/// up front.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaMetadata {
    /// MIME type (e.g., "image/png"); empty when unknown
    pub mime_type: String,
    /// Payload size in bytes
    pub size_bytes: u64,
    /// Image width in pixels
    pub width: Option<u32>,
    /// Image height in pixels
    pub height: Option<u32>,
    /// Free-form metadata
    pub extra: HashMap<String, String>,
}

impl MediaMetadata {
    /// Broad media category derived from the MIME type.
    pub fn media_type(&self) -> MediaType {
        MediaType::from_mime(&self.mime_type)
    }

    /// MIME type, or `application/octet-stream` when unknown.
    pub fn mime_or_default(&self) -> &str {
        if self.mime_type.is_empty() {
            "application/octet-stream"
        } else {
            &self.mime_type
        }
    }
}

//! Loaders for payloads that are already in the process.

use crate::{LoadedMedia, Loader, sniff_mime};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use tempera_core::MediaSource;
use tempera_error::{MediaError, MediaErrorKind};

/// Serves bytes held in memory.
///
/// References created with [`MediaReference::from_memory`](crate::MediaReference::from_memory)
/// use this loader to reload after eviction.
#[derive(Debug, Clone)]
pub struct InMemoryLoader {
    bytes: Arc<[u8]>,
    mime_type: Option<String>,
}

impl InMemoryLoader {
    /// Wrap an in-memory payload.
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type,
        }
    }

    /// Shared handle to the payload.
    pub fn bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }
}

#[async_trait::async_trait]
impl Loader for InMemoryLoader {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, _source: &MediaSource) -> Result<LoadedMedia, MediaError> {
        let mut loaded = LoadedMedia::new(self.bytes.to_vec());
        loaded.mime_type = self.mime_type.clone();
        Ok(loaded)
    }
}

/// Decode a raw base64 string or a `data:<mime>;base64,<payload>` URL.
///
/// Returns the bytes and the MIME type declared by the data URL, if any.
///
/// # Example
///
/// ```
/// use tempera_storage::decode_base64_payload;
///
/// let (bytes, mime) = decode_base64_payload("data:text/plain;base64,aGk=").unwrap();
/// assert_eq!(bytes, b"hi");
/// assert_eq!(mime.as_deref(), Some("text/plain"));
///
/// let (bytes, mime) = decode_base64_payload("aGk=").unwrap();
/// assert_eq!(bytes, b"hi");
/// assert!(mime.is_none());
/// ```
pub fn decode_base64_payload(data: &str) -> Result<(Vec<u8>, Option<String>), MediaError> {
    let data = data.trim();
    let (mime, payload) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or_else(|| {
                MediaError::new(MediaErrorKind::InvalidBase64(
                    "data URL has no ',' separator".to_string(),
                ))
            })?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or_else(|| {
                    MediaError::new(MediaErrorKind::InvalidBase64(
                        "data URL is not base64-encoded".to_string(),
                    ))
                })?
                .to_string();
            let mime = (!mime.is_empty()).then_some(mime);
            (mime, payload)
        }
        None => (None, data),
    };

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| MediaError::new(MediaErrorKind::InvalidBase64(e.to_string())))?;
    Ok((bytes, mime))
}

/// Decodes base64 sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Loader;

#[async_trait::async_trait]
impl Loader for Base64Loader {
    fn name(&self) -> &str {
        "base64"
    }

    async fn load(&self, source: &MediaSource) -> Result<LoadedMedia, MediaError> {
        let (bytes, declared) = decode_base64_payload(source.locator())?;
        let mime_type = declared.or_else(|| sniff_mime(&bytes).map(str::to_string));
        tracing::debug!(size = bytes.len(), mime = ?mime_type, "Decoded base64 payload");
        Ok(LoadedMedia {
            bytes,
            mime_type,
            ..Default::default()
        })
    }
}

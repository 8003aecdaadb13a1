//! Media source descriptors.

use serde::{Deserialize, Serialize};

/// Where a media payload lives before it is loaded.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Remote HTTP(S) URL
    #[display("url")]
    Url,
    /// Object storage path (`bucket/path`)
    #[display("object_store")]
    ObjectStore,
    /// Local filesystem path
    #[display("file")]
    File,
    /// Base64 payload or `data:` URL
    #[display("base64")]
    Base64,
    /// Bytes already held in process memory
    #[display("inline_memory")]
    InlineMemory,
}

impl SourceType {
    /// Whether fetching this source leaves the process.
    pub fn is_remote(&self) -> bool {
        matches!(self, SourceType::Url | SourceType::ObjectStore)
    }
}

/// Source descriptor for a media reference: a source type plus a locator string.
///
/// # Examples
///
/// ```
/// use tempera_core::{MediaSource, SourceType};
///
/// let source = MediaSource::url("https://example.com/cat.png");
/// assert_eq!(source.source_type(), SourceType::Url);
/// assert_eq!(source.locator(), "https://example.com/cat.png");
///
/// let object = MediaSource::object_store("assets", "img/cat.png");
/// assert_eq!(object.locator(), "assets/img/cat.png");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaSource {
    source_type: SourceType,
    locator: String,
}

impl MediaSource {
    /// Creates a source descriptor.
    pub fn new(source_type: SourceType, locator: impl Into<String>) -> Self {
        Self {
            source_type,
            locator: locator.into(),
        }
    }

    /// Remote URL source.
    pub fn url(url: impl Into<String>) -> Self {
        Self::new(SourceType::Url, url)
    }

    /// Object storage source, addressed as `bucket/path`.
    pub fn object_store(bucket: &str, path: &str) -> Self {
        let bucket = bucket.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Self::new(SourceType::ObjectStore, format!("{}/{}", bucket, path))
    }

    /// Local file source.
    pub fn file(path: impl Into<String>) -> Self {
        Self::new(SourceType::File, path)
    }

    /// Base64 or `data:` URL source.
    pub fn base64(data: impl Into<String>) -> Self {
        Self::new(SourceType::Base64, data)
    }

    /// In-memory source. The locator is only a label.
    pub fn inline_memory(label: impl Into<String>) -> Self {
        Self::new(SourceType::InlineMemory, label)
    }

    /// The source type.
    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    /// The locator string.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Locator shortened for log fields; base64 payloads can be megabytes long.
    pub fn display_locator(&self) -> String {
        const MAX: usize = 64;
        if self.locator.len() <= MAX {
            return self.locator.clone();
        }
        let mut end = MAX;
        while !self.locator.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...({} bytes)", &self.locator[..end], self.locator.len())
    }
}

impl std::fmt::Display for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source_type, self.display_locator())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_store_joins_bucket_and_path() {
        let source = MediaSource::object_store("media/", "/uploads/a.jpg");
        assert_eq!(source.locator(), "media/uploads/a.jpg");
        assert!(source.source_type().is_remote());
    }

    #[test]
    fn display_locator_truncates_long_payloads() {
        let source = MediaSource::base64("A".repeat(500));
        let shown = source.display_locator();
        assert!(shown.starts_with(&"A".repeat(64)));
        assert!(shown.ends_with("(500 bytes)"));
    }

    #[test]
    fn source_type_serializes_snake_case() {
        let json = serde_json::to_string(&SourceType::ObjectStore).unwrap();
        assert_eq!(json, "\"object_store\"");
    }
}

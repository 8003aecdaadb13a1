//! Media type enumeration.

/// Broad category of a media payload.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::EnumIter,
    derive_more::Display,
)]
pub enum MediaType {
    /// Image content (PNG, JPEG, WebP, etc.)
    #[display("image")]
    Image,
    /// Audio content (MP3, WAV, OGG, etc.)
    #[display("audio")]
    Audio,
    /// Video content (MP4, WebM, etc.)
    #[display("video")]
    Video,
    /// Anything else
    #[display("other")]
    Other,
}

impl MediaType {
    /// Classify a MIME type string.
    ///
    /// ```
    /// use tempera_core::MediaType;
    ///
    /// assert_eq!(MediaType::from_mime("image/png"), MediaType::Image);
    /// assert_eq!(MediaType::from_mime("application/pdf"), MediaType::Other);
    /// ```
    pub fn from_mime(mime: &str) -> Self {
        let top = mime.split('/').next().unwrap_or_default().trim();
        match top.to_ascii_lowercase().as_str() {
            "image" => MediaType::Image,
            "audio" => MediaType::Audio,
            "video" => MediaType::Video,
            _ => MediaType::Other,
        }
    }
}

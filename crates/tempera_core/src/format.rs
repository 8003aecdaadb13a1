//! Raster image formats understood by the pipeline.

use serde::{Deserialize, Serialize};

/// Encoded image format.
///
/// Serialized in lowercase so strategy files can say `target_format = "jpeg"`.
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
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG
    #[display("jpeg")]
    Jpeg,
    /// PNG
    #[display("png")]
    Png,
    /// WebP
    #[display("webp")]
    Webp,
    /// GIF
    #[display("gif")]
    Gif,
}

impl ImageFormat {
    /// MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Gif => "image/gif",
        }
    }

    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Gif => "gif",
        }
    }

    /// Parse a MIME type, ignoring parameters such as `; charset=`.
    ///
    /// ```
    /// use tempera_core::ImageFormat;
    ///
    /// assert_eq!(ImageFormat::from_mime("image/jpg"), Some(ImageFormat::Jpeg));
    /// assert_eq!(ImageFormat::from_mime("IMAGE/PNG; q=1"), Some(ImageFormat::Png));
    /// assert_eq!(ImageFormat::from_mime("text/plain"), None);
    /// ```
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            "image/webp" => Some(ImageFormat::Webp),
            "image/gif" => Some(ImageFormat::Gif),
            _ => None,
        }
    }

    /// Parse a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::Webp),
            "gif" => Some(ImageFormat::Gif),
            _ => None,
        }
    }

    /// Whether the encoder honours a quality setting for this format.
    pub fn is_lossy(&self) -> bool {
        matches!(self, ImageFormat::Jpeg)
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s)
            .or_else(|| Self::from_mime(s))
            .ok_or_else(|| format!("Unknown image format: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn mime_round_trips_for_every_format() {
        for format in ImageFormat::iter() {
            assert_eq!(ImageFormat::from_mime(format.mime_type()), Some(format));
            assert_eq!(ImageFormat::from_extension(format.extension()), Some(format));
        }
    }

    #[test]
    fn parses_config_names() {
        assert_eq!("jpeg".parse::<ImageFormat>(), Ok(ImageFormat::Jpeg));
        assert_eq!("WEBP".parse::<ImageFormat>(), Ok(ImageFormat::Webp));
        assert!("tiff".parse::<ImageFormat>().is_err());
    }
}

//! Named resize policies.

use serde::{Deserialize, Serialize};
use tempera_core::ImageFormat;

/// Resampling filter used when scaling.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Nearest neighbour
    #[display("nearest")]
    Nearest,
    /// Linear (triangle) filter
    #[serde(alias = "bilinear")]
    #[display("triangle")]
    Triangle,
    /// Cubic (Catmull-Rom) filter
    #[serde(alias = "bicubic")]
    #[display("catmull_rom")]
    CatmullRom,
    /// Gaussian filter
    #[display("gaussian")]
    Gaussian,
    /// Lanczos with window 3
    #[default]
    #[serde(alias = "lanczos")]
    #[display("lanczos3")]
    Lanczos3,
}

impl Interpolation {
    /// The `image` crate filter for this interpolation.
    pub fn filter(&self) -> image::imageops::FilterType {
        use image::imageops::FilterType;
        match self {
            Interpolation::Nearest => FilterType::Nearest,
            Interpolation::Triangle => FilterType::Triangle,
            Interpolation::CatmullRom => FilterType::CatmullRom,
            Interpolation::Gaussian => FilterType::Gaussian,
            Interpolation::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// A named resize policy.
///
/// Strategies are immutable once loaded. The pipeline resolves one per
/// consumer key and uses its parameters both to transform and to key the
/// result cache.
///
/// ```toml
/// [resize.strategies.vision_optimized]
/// max_width = 1024
/// max_height = 1024
/// max_file_size_kb = 500
/// quality = 85
/// target_format = "jpeg"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into))]
pub struct ResizeStrategy {
    /// Strategy name; filled from the table key when loaded from configuration
    #[serde(default)]
    #[builder(default)]
    pub name: String,

    /// Maximum output width in pixels
    #[serde(default = "default_max_dimension")]
    #[builder(default = "default_max_dimension()")]
    pub max_width: u32,

    /// Maximum output height in pixels
    #[serde(default = "default_max_dimension")]
    #[builder(default = "default_max_dimension()")]
    pub max_height: u32,

    /// Inputs at or under this size are passed through untouched
    #[serde(default = "default_max_file_size_kb")]
    #[builder(default = "default_max_file_size_kb()")]
    pub max_file_size_kb: u64,

    /// Encoder quality, 1-100 (lossy formats only)
    #[serde(default = "default_quality")]
    #[builder(default = "default_quality()")]
    pub quality: u8,

    /// Output format
    #[serde(default = "default_target_format")]
    #[builder(default = "default_target_format()")]
    pub target_format: ImageFormat,

    /// Resampling filter
    #[serde(default)]
    #[builder(default)]
    pub interpolation: Interpolation,

    /// Center-crop to exactly fill the box instead of fitting inside it
    #[serde(default)]
    #[builder(default)]
    pub crop_to_fill: bool,

    /// Unsharp-mask sigma applied after scaling
    #[serde(default)]
    #[builder(default)]
    pub sharpening: Option<f32>,

    /// Gaussian blur sigma applied after scaling
    #[serde(default)]
    #[builder(default)]
    pub noise_reduction: Option<f32>,

    /// Disabled strategies pass every input through
    #[serde(default = "default_enabled")]
    #[builder(default = "default_enabled()")]
    pub enabled: bool,

    /// Breaks ties between matching consumer patterns; higher wins
    #[serde(default)]
    #[builder(default)]
    pub priority: i32,
}

fn default_max_dimension() -> u32 {
    1024
}

fn default_max_file_size_kb() -> u64 {
    500
}

fn default_quality() -> u8 {
    85
}

fn default_target_format() -> ImageFormat {
    ImageFormat::Jpeg
}

fn default_enabled() -> bool {
    true
}

impl ResizeStrategy {
    /// Name of the built-in fallback strategy.
    pub const VISION_OPTIMIZED: &'static str = "vision_optimized";
    /// Name of the built-in thumbnail strategy.
    pub const THUMBNAIL: &'static str = "thumbnail";
    /// Name of the built-in high quality strategy.
    pub const HIGH_QUALITY: &'static str = "high_quality";

    /// Creates a new strategy builder.
    pub fn builder() -> ResizeStrategyBuilder {
        ResizeStrategyBuilder::default()
    }

    /// 1024x1024 JPEG at quality 85, sized for vision model input.
    pub fn vision_optimized() -> Self {
        Self {
            name: Self::VISION_OPTIMIZED.to_string(),
            max_width: 1024,
            max_height: 1024,
            max_file_size_kb: 500,
            quality: 85,
            target_format: ImageFormat::Jpeg,
            interpolation: Interpolation::Lanczos3,
            crop_to_fill: false,
            sharpening: None,
            noise_reduction: None,
            enabled: true,
            priority: 10,
        }
    }

    /// 256x256 center-cropped JPEG.
    pub fn thumbnail() -> Self {
        Self {
            name: Self::THUMBNAIL.to_string(),
            max_width: 256,
            max_height: 256,
            max_file_size_kb: 50,
            quality: 75,
            interpolation: Interpolation::Triangle,
            crop_to_fill: true,
            priority: 5,
            ..Self::vision_optimized()
        }
    }

    /// 2048x2048 JPEG at quality 95 with light sharpening.
    pub fn high_quality() -> Self {
        Self {
            name: Self::HIGH_QUALITY.to_string(),
            max_width: 2048,
            max_height: 2048,
            max_file_size_kb: 2048,
            quality: 95,
            sharpening: Some(0.5),
            priority: 1,
            ..Self::vision_optimized()
        }
    }

    /// The built-in strategy with this name, if any.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            Self::VISION_OPTIMIZED => Some(Self::vision_optimized()),
            Self::THUMBNAIL => Some(Self::thumbnail()),
            Self::HIGH_QUALITY => Some(Self::high_quality()),
            _ => None,
        }
    }

    /// Byte threshold for pass-through.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_kb.saturating_mul(1024)
    }

    /// Whether a `width` x `height` image fits the box as-is.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        width <= self.max_width && height <= self.max_height
    }
}

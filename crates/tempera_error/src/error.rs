//! Top-level error wrapper types.

use crate::{ConfigError, ContextError, ConversionError, JsonError, MediaError, ResizeError};

/// Every error condition the Tempera crates can surface.
///
/// # Examples
///
/// ```
/// use tempera_error::{ConfigError, TemperaError};
///
/// let err: TemperaError = ConfigError::new("bad budget").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum TemperaErrorKind {
    /// Media reference, collection, or loader error
    #[from(MediaError)]
    Media(MediaError),
    /// Resize pipeline error
    #[from(ResizeError)]
    Resize(ResizeError),
    /// Format conversion error
    #[from(ConversionError)]
    Conversion(ConversionError),
    /// Context store error
    #[from(ContextError)]
    Context(ContextError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
}

/// Tempera error with kind discrimination.
///
/// # Examples
///
/// ```
/// use tempera_error::{MediaError, MediaErrorKind, TemperaErrorKind, TemperaResult};
///
/// fn might_fail() -> TemperaResult<()> {
///     Err(MediaError::new(MediaErrorKind::Cancelled))?
/// }
///
/// let err = might_fail().unwrap_err();
/// assert!(matches!(err.kind(), TemperaErrorKind::Media(_)));
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Tempera Error: {}", _0)]
pub struct TemperaError(Box<TemperaErrorKind>);

impl TemperaError {
    /// Create a new error from a kind.
    pub fn new(kind: TemperaErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &TemperaErrorKind {
        &self.0
    }

    /// The media error, if this is one.
    pub fn as_media(&self) -> Option<&MediaError> {
        match self.kind() {
            TemperaErrorKind::Media(err) => Some(err),
            _ => None,
        }
    }

    /// The resize error, if this is one.
    pub fn as_resize(&self) -> Option<&ResizeError> {
        match self.kind() {
            TemperaErrorKind::Resize(err) => Some(err),
            _ => None,
        }
    }

    /// The context error, if this is one.
    pub fn as_context(&self) -> Option<&ContextError> {
        match self.kind() {
            TemperaErrorKind::Context(err) => Some(err),
            _ => None,
        }
    }

    /// The conversion error, if this is one.
    pub fn as_conversion(&self) -> Option<&ConversionError> {
        match self.kind() {
            TemperaErrorKind::Conversion(err) => Some(err),
            _ => None,
        }
    }
}

// Generic From implementation for any type that converts to TemperaErrorKind
impl<T> From<T> for TemperaError
where
    T: Into<TemperaErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Tempera operations.
pub type TemperaResult<T> = std::result::Result<T, TemperaError>;

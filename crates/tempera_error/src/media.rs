//! Media reference and loader error types.

/// Kinds of media errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum MediaErrorKind {
    /// No reference registered under the given key or ID
    #[display("Media not found: {}", _0)]
    NotFound(String),
    /// A reference with this ID is already registered
    #[display("Duplicate media ID: {}", _0)]
    DuplicateId(String),
    /// The underlying fetch failed
    #[display("Loader '{}' failed: {}", loader, message)]
    Loader {
        /// Loader name
        loader: String,
        /// Failure description
        message: String,
    },
    /// The loader did not answer within the configured timeout
    #[display("Load timed out after {}ms", _0)]
    LoadTimeout(u64),
    /// The caller cancelled the load
    #[display("Load cancelled")]
    Cancelled,
    /// No loader is registered for the source type
    #[display("No loader registered for source type '{}'", _0)]
    NoLoader(String),
    /// Payload exceeds the allowed size
    #[display("Payload of {} bytes exceeds limit of {} bytes", size, limit)]
    TooLarge {
        /// Actual payload size
        size: u64,
        /// Configured limit
        limit: u64,
    },
    /// Locator cannot be interpreted by the loader
    #[display("Invalid locator: {}", _0)]
    InvalidLocator(String),
    /// Base64 payload could not be decoded
    #[display("Invalid base64 payload: {}", _0)]
    InvalidBase64(String),
}

/// Media error with location tracking.
///
/// # Examples
///
/// ```
/// use tempera_error::{MediaError, MediaErrorKind};
///
/// let err = MediaError::new(MediaErrorKind::NotFound("hero".to_string()));
/// assert!(format!("{}", err).contains("not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Media Error: {} at line {} in {}", kind, line, file)]
pub struct MediaError {
    /// The kind of error that occurred
    pub kind: MediaErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl MediaError {
    /// Create a new media error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: MediaErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for a [`MediaErrorKind::Loader`] failure.
    #[track_caller]
    pub fn loader(loader: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(MediaErrorKind::Loader {
            loader: loader.into(),
            message: message.into(),
        })
    }

    /// Whether this failure describes the caller giving up rather than the source failing.
    pub fn is_interruption(&self) -> bool {
        matches!(
            self.kind,
            MediaErrorKind::Cancelled | MediaErrorKind::LoadTimeout(_)
        )
    }
}

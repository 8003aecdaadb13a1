//! Resize pipeline error types.

/// Specific error conditions for resize operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ResizeErrorKind {
    /// Input bytes are not a decodable image
    #[display("Failed to decode image: {}", _0)]
    Decode(String),
    /// Output could not be encoded
    #[display("Failed to encode image: {}", _0)]
    Encode(String),
    /// Target format is not supported by the encoder
    #[display("Unsupported image format: {}", _0)]
    UnsupportedFormat(String),
    /// A worker task panicked or was aborted
    #[display("Resize worker failed: {}", _0)]
    Worker(String),
    /// The batch was cancelled before the item was admitted
    #[display("Resize cancelled")]
    Cancelled,
    /// Some batch items failed; the rest succeeded
    #[display("Batch partially failed for keys: {}", failed.join(", "))]
    PartialBatch {
        /// Keys that failed
        failed: Vec<String>,
    },
    /// Every batch item failed
    #[display("Batch failed for all keys: {}", failed.join(", "))]
    BatchFailed {
        /// Keys that failed
        failed: Vec<String>,
    },
    /// The batch contained no images
    #[display("Batch contains no images")]
    EmptyBatch,
}

/// Error type for resize operations.
///
/// # Examples
///
/// ```
/// use tempera_error::{ResizeError, ResizeErrorKind};
///
/// let err = ResizeError::new(ResizeErrorKind::Decode("truncated JPEG".to_string()));
/// assert!(format!("{}", err).contains("decode"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Resize Error: {} at line {} in {}", kind, line, file)]
pub struct ResizeError {
    /// The specific error condition
    pub kind: ResizeErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ResizeError {
    /// Create a new ResizeError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ResizeErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

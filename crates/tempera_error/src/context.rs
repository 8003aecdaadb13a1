//! Context store error types.

/// Kinds of context store errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ContextErrorKind {
    /// Key is not present in the store
    #[display("Context key not found: {}", _0)]
    KeyNotFound(String),
    /// Value under the key has a different kind than requested
    #[display("Context key '{}' holds {}, expected {}", key, actual, expected)]
    TypeMismatch {
        /// Key that was read
        key: String,
        /// Requested kind
        expected: String,
        /// Stored kind
        actual: String,
    },
    /// Key holds a scalar where media was expected
    #[display("Context key '{}' does not hold media", _0)]
    NotMedia(String),
}

/// Context store error with location tracking.
///
/// # Examples
///
/// ```
/// use tempera_error::{ContextError, ContextErrorKind};
///
/// let err = ContextError::new(ContextErrorKind::KeyNotFound("prompt".to_string()));
/// assert!(format!("{}", err).contains("prompt"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Context Error: {} at line {} in {}", kind, line, file)]
pub struct ContextError {
    /// The kind of error that occurred
    pub kind: ContextErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ContextError {
    /// Create a new context error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ContextErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

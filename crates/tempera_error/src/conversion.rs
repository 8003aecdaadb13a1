//! Format conversion error types.

/// Kinds of conversion errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ConversionErrorKind {
    /// No registered converter accepts the request
    #[display("No converter can produce {} from {}", target, origin)]
    NoConverter {
        /// Source description
        origin: String,
        /// Requested target
        target: String,
    },
    /// The selected converter does not handle this combination
    #[display("Converter '{}' does not support {}", converter, target)]
    Unsupported {
        /// Converter name
        converter: String,
        /// Requested target
        target: String,
    },
    /// Conversion ran and failed
    #[display("Conversion failed: {}", _0)]
    Failed(String),
}

/// Conversion error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Conversion Error: {} at line {} in {}", kind, line, file)]
pub struct ConversionError {
    /// The kind of error that occurred
    pub kind: ConversionErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ConversionError {
    /// Create a new conversion error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ConversionErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

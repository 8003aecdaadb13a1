//! Error types for the Tempera media pipeline.
//!
//! # Error Hierarchy
//!
//! Every domain follows the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum names the specific condition
//! - `*Error` struct wraps the kind with the source location that raised it
//! - Constructors use `#[track_caller]` so the location is captured automatically
//!
//! All domain errors convert into [`TemperaError`] with `?`.
//!
//! # Examples
//!
//! ```
//! use tempera_error::{MediaError, MediaErrorKind, TemperaResult};
//!
//! fn lookup(key: &str) -> TemperaResult<Vec<u8>> {
//!     Err(MediaError::new(MediaErrorKind::NotFound(key.to_string())))?
//! }
//!
//! assert!(lookup("logo").is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod conversion;
mod error;
mod json;
mod media;
mod resize;

pub use config::ConfigError;
pub use context::{ContextError, ContextErrorKind};
pub use conversion::{ConversionError, ConversionErrorKind};
pub use error::{TemperaError, TemperaErrorKind, TemperaResult};
pub use json::JsonError;
pub use media::{MediaError, MediaErrorKind};
pub use resize::{ResizeError, ResizeErrorKind};

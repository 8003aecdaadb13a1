//! Core media vocabulary for the Tempera media pipeline.
//!
//! This crate provides the source descriptors and format types shared by the
//! storage, transform, and context crates, plus telemetry bootstrap.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod format;
mod media_type;
mod source;
mod telemetry;

pub use format::ImageFormat;
pub use media_type::MediaType;
pub use source::{MediaSource, SourceType};
pub use telemetry::{TelemetryConfig, init_telemetry, init_telemetry_with_config, shutdown_telemetry};

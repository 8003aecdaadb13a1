//! Tempera - media references and resizing for AI workflows
//!
//! Tempera holds large image payloads for many concurrent workflow executions
//! without materializing more bytes than a configured budget allows. Media is
//! registered lazily, loaded on first use, evicted oldest-first under memory
//! pressure, and resized or converted on demand.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tempera::{Tempera, TemperaConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     tempera::init_telemetry()?;
//!
//!     let tempera = Tempera::new(TemperaConfig::load()?)?;
//!     let store = tempera.context_store();
//!     store.set_image_from_file("photo", "assets/cat.jpg")?;
//!
//!     let thumb = tempera.resize_image(&store, "photo", "gallery").await?;
//!     println!("{:?}x{:?}", thumb.width, thumb.height);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `tempera_error` - Error types
//! - `tempera_core` - Source descriptors, formats, telemetry
//! - `tempera_cache` - TTL result cache and fingerprints
//! - `tempera_storage` - Loaders, media references, bounded-memory collection
//! - `tempera_transform` - Resize pipeline, batches, converter chain
//! - `tempera_context` - Per-execution key/value store with media
//!
//! This crate (`tempera`) re-exports everything and adds layered
//! configuration loading.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod runtime;

pub use config::TemperaConfig;
pub use runtime::Tempera;

pub use tempera_cache::*;
pub use tempera_context::*;
pub use tempera_core::*;
pub use tempera_error::*;
pub use tempera_storage::*;
pub use tempera_transform::*;

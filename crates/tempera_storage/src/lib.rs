//! Lazy media references and bounded-memory reference tracking for Tempera.
//!
//! This crate holds the source side of the media pipeline:
//!
//! - **Loaders**: pluggable fetchers for one source type each (URL, object
//!   storage, file, base64, in-memory). Network transports are supplied by the
//!   host through [`HttpFetcher`] and [`ObjectStoreClient`].
//! - **[`MediaReference`]**: a lazy handle that loads bytes once on first use,
//!   caches them, and memoizes failures according to its [`LoadErrorPolicy`].
//! - **[`ReferenceCollection`]**: a registry that keeps the total of cached
//!   bytes under a ceiling by evicting the oldest cached reference first.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tempera_storage::{MediaReference, ReferenceCollection};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let collection = ReferenceCollection::new(8 * 1024 * 1024);
//! let reference = Arc::new(MediaReference::from_memory(vec![0u8; 1024], "image/png"));
//! let id = reference.id();
//!
//! collection.add(reference)?;
//! let bytes = collection.load_bytes(id).await?;
//! assert_eq!(bytes.len(), 1024);
//! assert_eq!(collection.memory_usage(), 1024);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod filesystem;
mod inline;
mod loader;
mod metadata;
mod metrics;
mod reference;
mod remote;
mod sniff;

pub use collection::ReferenceCollection;
pub use filesystem::FileLoader;
pub use inline::{Base64Loader, InMemoryLoader, decode_base64_payload};
pub use loader::{LoadedMedia, Loader, LoaderRegistry};
pub use metadata::MediaMetadata;
pub use metrics::{MediaMetrics, MetricsSnapshot};
pub use reference::{DEFAULT_CACHE_TTL, LoadErrorPolicy, MediaReference};
pub use remote::{
    FetchedBody, HttpFetcher, ObjectStoreClient, ObjectStoreLoader, UrlLoader,
    parse_object_locator,
};
pub use sniff::{sniff_dimensions, sniff_mime};

pub use tempera_error::{MediaError, MediaErrorKind};

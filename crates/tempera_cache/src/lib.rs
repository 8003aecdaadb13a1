//! Result caching with TTL support.
//!
//! This crate provides the caches that hold *derived* media outputs (resized
//! images, converted payloads) keyed by deterministic content fingerprints.
//! Source references are tracked elsewhere; nothing here owns them.

#![warn(missing_docs)]

mod cache;
mod fingerprint;

pub use cache::{CacheConfig, CacheConfigBuilder, CacheEntry, TtlCache};
pub use fingerprint::{Fingerprint, content_hash};

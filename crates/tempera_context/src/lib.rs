//! Per-execution context for Tempera workflows.
//!
//! A [`ContextStore`] maps string keys to either a [`ContextValue`] or a media
//! reference. Media registered through the `set_image_from_*` family is held
//! lazily by the store's [`ReferenceCollection`](tempera_storage::ReferenceCollection)
//! and only loaded when a consumer asks for bytes, so a workflow can register
//! many images while keeping cached bytes under
//! [`ContextConfig::max_memory_bytes`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod store;
mod value;

pub use config::{ContextConfig, ContextConfigBuilder};
pub use store::{ContextEntry, ContextStore};
pub use value::ContextValue;

pub use tempera_error::{ContextError, ContextErrorKind};

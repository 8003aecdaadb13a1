//! Context store limits.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tempera_storage::LoadErrorPolicy;

/// Limits and policies for one [`ContextStore`](crate::ContextStore).
///
/// ```toml
/// [context]
/// max_memory_bytes = 104857600
/// max_inline_bytes = 10485760
/// load_timeout_secs = 30
/// load_error_policy = "sticky"
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
pub struct ContextConfig {
    /// Ceiling for cached media bytes
    #[serde(default = "default_max_memory_bytes")]
    #[builder(default = "default_max_memory_bytes()")]
    max_memory_bytes: u64,

    /// Largest payload accepted by `set_image_from_memory`
    #[serde(default = "default_max_inline_bytes")]
    #[builder(default = "default_max_inline_bytes()")]
    max_inline_bytes: u64,

    /// Per-load timeout in seconds; none when absent
    #[serde(default)]
    #[builder(default)]
    load_timeout_secs: Option<u64>,

    /// What references do after a failed load
    #[serde(default)]
    #[builder(default)]
    load_error_policy: LoadErrorPolicy,
}

fn default_max_memory_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_max_inline_bytes() -> u64 {
    10 * 1024 * 1024
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: default_max_memory_bytes(),
            max_inline_bytes: default_max_inline_bytes(),
            load_timeout_secs: None,
            load_error_policy: LoadErrorPolicy::default(),
        }
    }
}

impl ContextConfig {
    /// Creates a new config builder.
    pub fn builder() -> ContextConfigBuilder {
        ContextConfigBuilder::default()
    }

    /// The load timeout as a [`Duration`].
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

//! Layered Tempera configuration.
//!
//! Configuration is assembled from, in increasing precedence:
//! - Bundled defaults (include_str! from tempera.toml)
//! - User config in the home directory (~/.config/tempera/tempera.toml)
//! - User config in the current directory (./tempera.toml)

use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::{Deserialize, Serialize};
use tempera_cache::CacheConfig;
use tempera_context::ContextConfig;
use tempera_error::{ConfigError, TemperaError, TemperaResult};
use tempera_transform::ResizeConfig;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../tempera.toml");

/// Top-level Tempera configuration.
///
/// # Example
///
/// ```no_run
/// use tempera::TemperaConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = TemperaConfig::load()?;
/// let strategy = config.resize.resolve_strategy("gallery");
/// println!("gallery images resize with {}", strategy.name);
/// # Ok(())
/// # }
/// ```
#[derive(
    Debug, Clone, PartialEq, Default, Serialize, Deserialize, derive_setters::Setters,
)]
#[setters(prefix = "with_")]
pub struct TemperaConfig {
    /// Resize pipeline strategies and limits
    #[serde(default)]
    pub resize: ResizeConfig,

    /// Context store limits
    #[serde(default)]
    pub context: ContextConfig,

    /// Converter chain result cache
    #[serde(default)]
    pub conversion: CacheConfig,
}

impl TemperaConfig {
    /// Load configuration with precedence: current dir > home dir > bundled defaults.
    ///
    /// User config files are optional and silently skipped when absent.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a file cannot be parsed or the merged
    /// result fails [`TemperaConfig::validate`].
    #[instrument]
    pub fn load() -> TemperaResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        let mut builder = Self::bundled();

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/tempera/tempera.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("tempera").required(false));

        Self::finish(builder)
    }

    /// Load bundled defaults overlaid with a specific file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file is missing, cannot be parsed,
    /// or fails validation.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> TemperaResult<Self> {
        debug!("Loading configuration from file");
        Self::finish(Self::bundled().add_source(File::from(path.as_ref())))
    }

    /// Parse a TOML document on top of the bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the document is malformed or invalid.
    pub fn from_toml(toml: &str) -> TemperaResult<Self> {
        Self::finish(Self::bundled().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    /// The bundled defaults alone.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the shipped defaults fail to parse.
    pub fn bundled_defaults() -> TemperaResult<Self> {
        Self::finish(Self::bundled())
    }

    fn bundled() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> TemperaResult<Self> {
        let config: Self = builder
            .build()
            .map_err(|e| {
                TemperaError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                TemperaError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;
        config.validate()?;
        debug!(
            strategies = config.resize.strategies.len(),
            consumers = config.resize.consumer_strategies.len(),
            max_memory_bytes = config.context.max_memory_bytes(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Check strategies and limits.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resize.validate()?;

        if *self.context.max_memory_bytes() == 0 {
            return Err(ConfigError::new("context.max_memory_bytes must be positive"));
        }
        if *self.context.max_inline_bytes() == 0 {
            return Err(ConfigError::new("context.max_inline_bytes must be positive"));
        }
        if *self.conversion.enabled() && *self.conversion.max_size() == 0 {
            return Err(ConfigError::new(
                "conversion.max_size must be positive when the cache is enabled",
            ));
        }
        Ok(())
    }
}

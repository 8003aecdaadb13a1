//! Resize pipeline configuration and strategy resolution.

use crate::ResizeStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tempera_cache::CacheConfig;
use tempera_error::ConfigError;

/// Configuration for [`ResizePipeline`](crate::ResizePipeline).
///
/// Consumers are mapped to strategies by exact key first, then by
/// `prefix*` patterns (the matching strategy with the highest priority wins),
/// then the configured default, then the built-in `vision_optimized`.
///
/// ```toml
/// [resize]
/// enabled = true
/// default_strategy = "vision_optimized"
/// max_concurrency = 3
///
/// [resize.consumer_strategies]
/// "gallery" = "thumbnail"
/// "vision.*" = "vision_optimized"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct ResizeConfig {
    /// Global switch; when off every input is returned unchanged
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Strategy used when no consumer mapping matches
    #[serde(default = "default_strategy_name")]
    #[setters(into)]
    pub default_strategy: String,

    /// Named strategies
    #[serde(default = "builtin_strategies")]
    pub strategies: HashMap<String, ResizeStrategy>,

    /// Consumer key (or `prefix*` pattern) to strategy name
    #[serde(default)]
    pub consumer_strategies: HashMap<String, String>,

    /// Worker ceiling for parallel batches
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Result cache settings
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_enabled() -> bool {
    true
}

fn default_strategy_name() -> String {
    ResizeStrategy::VISION_OPTIMIZED.to_string()
}

fn default_max_concurrency() -> usize {
    3
}

fn builtin_strategies() -> HashMap<String, ResizeStrategy> {
    [
        ResizeStrategy::vision_optimized(),
        ResizeStrategy::thumbnail(),
        ResizeStrategy::high_quality(),
    ]
    .into_iter()
    .map(|strategy| (strategy.name.clone(), strategy))
    .collect()
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_strategy: default_strategy_name(),
            strategies: builtin_strategies(),
            consumer_strategies: HashMap::new(),
            max_concurrency: default_max_concurrency(),
            cache: CacheConfig::default(),
        }
    }
}

impl ResizeConfig {
    /// Add or replace a strategy under its own name.
    pub fn with_strategy(mut self, strategy: ResizeStrategy) -> Self {
        self.strategies.insert(strategy.name.clone(), strategy);
        self
    }

    /// Map a consumer key or `prefix*` pattern to a strategy name.
    pub fn with_consumer(mut self, consumer: impl Into<String>, strategy: impl Into<String>) -> Self {
        self.consumer_strategies
            .insert(consumer.into(), strategy.into());
        self
    }

    /// Look up a strategy by name, falling back to the built-ins.
    ///
    /// The returned strategy carries `name` even when the configuration
    /// table left it blank.
    pub fn strategy(&self, name: &str) -> Option<ResizeStrategy> {
        match self.strategies.get(name) {
            Some(strategy) => {
                let mut strategy = strategy.clone();
                if strategy.name.is_empty() {
                    strategy.name = name.to_string();
                }
                Some(strategy)
            }
            None => ResizeStrategy::builtin(name),
        }
    }

    /// Strategy for a consumer key.
    ///
    /// # Example
    ///
    /// ```
    /// use tempera_transform::{ResizeConfig, ResizeStrategy};
    ///
    /// let config = ResizeConfig::default()
    ///     .with_consumer("gallery", "thumbnail")
    ///     .with_consumer("vision.*", "high_quality");
    ///
    /// assert_eq!(config.resolve_strategy("gallery").name, "thumbnail");
    /// assert_eq!(config.resolve_strategy("vision.describe").name, "high_quality");
    /// assert_eq!(config.resolve_strategy("unknown").name, ResizeStrategy::VISION_OPTIMIZED);
    /// ```
    pub fn resolve_strategy(&self, consumer_key: &str) -> ResizeStrategy {
        if let Some(strategy) = self
            .consumer_strategies
            .get(consumer_key)
            .and_then(|name| self.strategy(name))
        {
            return strategy;
        }

        let by_pattern = self
            .consumer_strategies
            .iter()
            .filter_map(|(pattern, name)| {
                let prefix = pattern.strip_suffix('*')?;
                consumer_key
                    .starts_with(prefix)
                    .then(|| self.strategy(name).map(|s| (prefix.len(), s)))
                    .flatten()
            })
            .max_by(|(a_len, a), (b_len, b)| {
                a.priority
                    .cmp(&b.priority)
                    .then(a_len.cmp(b_len))
                    .then_with(|| b.name.cmp(&a.name))
            })
            .map(|(_, strategy)| strategy);
        if let Some(strategy) = by_pattern {
            return strategy;
        }

        self.strategy(&self.default_strategy).unwrap_or_else(|| {
            tracing::warn!(
                default_strategy = %self.default_strategy,
                "Default strategy not found, using vision_optimized"
            );
            ResizeStrategy::vision_optimized()
        })
    }

    /// Check strategy parameters and consumer mappings.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first invalid entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::new("resize.max_concurrency must be at least 1"));
        }

        let mut names: Vec<_> = self.strategies.keys().collect();
        names.sort();
        for name in names {
            let strategy = &self.strategies[name];
            if strategy.max_width == 0 || strategy.max_height == 0 {
                return Err(ConfigError::new(format!(
                    "strategy '{}' must have non-zero max_width and max_height",
                    name
                )));
            }
            if !(1..=100).contains(&strategy.quality) {
                return Err(ConfigError::new(format!(
                    "strategy '{}' quality {} is outside 1-100",
                    name, strategy.quality
                )));
            }
            for (label, sigma) in [
                ("sharpening", strategy.sharpening),
                ("noise_reduction", strategy.noise_reduction),
            ] {
                if sigma.is_some_and(|s| !s.is_finite() || s <= 0.0) {
                    return Err(ConfigError::new(format!(
                        "strategy '{}' {} must be a positive number",
                        name, label
                    )));
                }
            }
        }

        if self.strategy(&self.default_strategy).is_none() {
            return Err(ConfigError::new(format!(
                "default strategy '{}' is not defined",
                self.default_strategy
            )));
        }

        let mut consumers: Vec<_> = self.consumer_strategies.iter().collect();
        consumers.sort();
        for (consumer, name) in consumers {
            if self.strategy(name).is_none() {
                return Err(ConfigError::new(format!(
                    "consumer '{}' maps to unknown strategy '{}'",
                    consumer, name
                )));
            }
        }
        Ok(())
    }
}

//! TTL cache implementation.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Cache entry with value and expiration.
#[derive(Debug, Clone, Getters)]
pub struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Check if this entry is expired.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }

    /// Get remaining time until expiration.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.ttl.checked_sub(self.created_at.elapsed())
    }
}

/// Configuration for a TTL cache.
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
pub struct CacheConfig {
    /// Default TTL for cached entries (seconds)
    #[serde(default = "default_ttl")]
    #[builder(default = "default_ttl()")]
    default_ttl: u64,

    /// Maximum cache size (number of entries)
    #[serde(default = "default_max_size")]
    #[builder(default = "default_max_size()")]
    max_size: usize,

    /// Whether caching is enabled
    #[serde(default = "default_enabled")]
    #[builder(default = "default_enabled()")]
    enabled: bool,
}

fn default_ttl() -> u64 {
    3600 // 1 hour
}

fn default_max_size() -> usize {
    100
}

fn default_enabled() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: default_ttl(),
            max_size: default_max_size(),
            enabled: default_enabled(),
        }
    }
}

impl CacheConfig {
    /// Creates a new config builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }
}

/// Bounded cache with TTL-based expiration.
///
/// When full, inserting a new key evicts the least recently used entry.
/// Expired entries are dropped lazily on lookup or by [`TtlCache::cleanup_expired`].
///
/// Not internally synchronized; owners wrap it in a `Mutex`.
///
/// # Example
///
/// ```
/// use tempera_cache::{CacheConfig, TtlCache};
///
/// let mut cache: TtlCache<String, Vec<u8>> = TtlCache::new(CacheConfig::default());
///
/// cache.insert("thumb:abc".to_string(), vec![1, 2, 3], None);
/// assert_eq!(cache.get(&"thumb:abc".to_string()), Some(vec![1, 2, 3]));
/// assert_eq!(cache.get(&"thumb:missing".to_string()), None);
/// ```
#[derive(Debug)]
pub struct TtlCache<K, V> {
    config: CacheConfig,
    entries: HashMap<K, CacheEntry<V>>,
    access_order: VecDeque<K>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// Create a new cache with configuration.
    pub fn new(config: CacheConfig) -> Self {
        tracing::debug!(
            default_ttl = config.default_ttl,
            max_size = config.max_size,
            enabled = config.enabled,
            "Creating new TtlCache"
        );
        Self {
            config,
            entries: HashMap::new(),
            access_order: VecDeque::new(),
        }
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Insert a value, using the default TTL when `ttl` is `None`.
    ///
    /// Returns the key evicted to make room, if any.
    pub fn insert(&mut self, key: K, value: V, ttl: Option<Duration>) -> Option<K> {
        if !self.config.enabled || self.config.max_size == 0 {
            tracing::debug!("Cache disabled, skipping insert");
            return None;
        }

        let ttl = ttl.unwrap_or(Duration::from_secs(self.config.default_ttl));
        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
            ttl,
        };

        let mut evicted = None;
        if self.entries.len() >= self.config.max_size && !self.entries.contains_key(&key) {
            evicted = self.evict_lru();
        }

        self.touch(&key);
        self.entries.insert(key, entry);
        tracing::debug!(ttl = ?ttl, size = self.entries.len(), "Inserted entry into cache");
        evicted
    }

    /// Get a cached value.
    ///
    /// Returns `None` if the entry doesn't exist, is expired, or the cache is disabled.
    pub fn get(&mut self, key: &K) -> Option<V> {
        if !self.config.enabled {
            return None;
        }

        let expired = self.entries.get(key)?.is_expired();
        if expired {
            tracing::debug!(key = ?key, "Cache entry expired, removing");
            self.remove(key);
            return None;
        }

        self.touch(key);
        let entry = self.entries.get(key)?;
        tracing::debug!(key = ?key, time_remaining = ?entry.time_remaining(), "Cache hit");
        Some(entry.value.clone())
    }

    /// Check for a live entry without updating recency.
    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        if let Some(pos) = self.access_order.iter().position(|k| k == key) {
            self.access_order.remove(pos);
        }
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Remove expired entries from cache.
    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let entries = &self.entries;
        self.access_order.retain(|key| entries.contains_key(key));

        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::info!(removed, remaining = self.entries.len(), "Cleaned up expired cache entries");
        }
        removed
    }

    /// Clear all cache entries.
    pub fn clear(&mut self) {
        let count = self.entries.len();
        self.entries.clear();
        self.access_order.clear();
        tracing::info!(cleared = count, "Cleared cache");
    }

    /// Get number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.access_order.iter().position(|k| k == key) {
            self.access_order.remove(pos);
        }
        self.access_order.push_back(key.clone());
    }

    fn evict_lru(&mut self) -> Option<K> {
        let key = self.access_order.pop_front()?;
        tracing::debug!(key = ?key, "Evicting LRU entry");
        self.entries.remove(&key);
        Some(key)
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cache(max_size: usize) -> TtlCache<String, u32> {
        TtlCache::new(CacheConfig::default().with_max_size(max_size))
    }

    #[test]
    fn evicts_least_recently_used_when_full() {
        let mut cache = small_cache(2);
        cache.insert("a".to_string(), 1, None);
        cache.insert("b".to_string(), 2, None);

        // Touch "a" so "b" becomes the eviction candidate.
        assert_eq!(cache.get(&"a".to_string()), Some(1));

        let evicted = cache.insert("c".to_string(), 3, None);
        assert_eq!(evicted, Some("b".to_string()));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&"a".to_string()));
        assert!(cache.contains(&"c".to_string()));
    }

    #[test]
    fn replacing_a_key_does_not_evict() {
        let mut cache = small_cache(1);
        cache.insert("a".to_string(), 1, None);
        assert_eq!(cache.insert("a".to_string(), 2, None), None);
        assert_eq!(cache.get(&"a".to_string()), Some(2));
    }

    #[test]
    fn expired_entries_are_dropped_on_lookup() {
        let mut cache = small_cache(4);
        cache.insert("a".to_string(), 1, Some(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&"a".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn cleanup_expired_keeps_live_entries() {
        let mut cache = small_cache(4);
        cache.insert("old".to_string(), 1, Some(Duration::ZERO));
        cache.insert("new".to_string(), 2, Some(Duration::from_secs(60)));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&"new".to_string()));
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let mut cache: TtlCache<String, u32> =
            TtlCache::new(CacheConfig::default().with_enabled(false));
        cache.insert("a".to_string(), 1, None);
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: CacheConfig = serde_json::from_str(r#"{"max_size": 8}"#).unwrap();
        assert_eq!(*config.max_size(), 8);
        assert_eq!(*config.default_ttl(), 3600);
        assert!(*config.enabled());
    }

    #[test]
    fn builder_applies_defaults() {
        let config = CacheConfig::builder().max_size(5_usize).build().unwrap();
        assert_eq!(*config.max_size(), 5);
        assert_eq!(*config.default_ttl(), 3600);
    }
}

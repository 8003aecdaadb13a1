//! Metrics collection for media references.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for one context store's media.
///
/// Cloning yields another handle onto the same counters. There is no
/// process-wide instance: the host creates collectors, hands them to the
/// stores it builds, and aggregates [`MetricsSnapshot`]s itself.
#[derive(Debug, Clone, Default)]
pub struct MediaMetrics {
    inner: Arc<MediaMetricsInner>,
}

#[derive(Debug, Default)]
struct MediaMetricsInner {
    registrations: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    cache_hits: AtomicU64,
    evictions: AtomicU64,
    bytes_loaded: AtomicU64,
    bytes_evicted: AtomicU64,
}

impl MediaMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reference registration.
    pub fn record_registration(&self) {
        self.inner.registrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a loader invocation that produced `bytes` bytes.
    pub fn record_load(&self, bytes: u64) {
        self.inner.loads.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_loaded.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a failed load.
    pub fn record_load_failure(&self) {
        self.inner.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a load served from cached bytes.
    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an eviction that freed `bytes` bytes.
    pub fn record_eviction(&self, bytes: u64) {
        self.inner.evictions.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_evicted.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            registrations: self.inner.registrations.load(Ordering::Relaxed),
            loads: self.inner.loads.load(Ordering::Relaxed),
            load_failures: self.inner.load_failures.load(Ordering::Relaxed),
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            bytes_loaded: self.inner.bytes_loaded.load(Ordering::Relaxed),
            bytes_evicted: self.inner.bytes_evicted.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`MediaMetrics`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// References registered
    pub registrations: u64,
    /// Loader invocations that succeeded
    pub loads: u64,
    /// Loads that failed
    pub load_failures: u64,
    /// Loads answered from cached bytes
    pub cache_hits: u64,
    /// References whose bytes were evicted
    pub evictions: u64,
    /// Bytes produced by loaders
    pub bytes_loaded: u64,
    /// Bytes released by eviction
    pub bytes_evicted: u64,
}

impl MetricsSnapshot {
    /// Sum two snapshots, e.g. across the stores of several executions.
    pub fn merge(&self, other: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            registrations: self.registrations + other.registrations,
            loads: self.loads + other.loads,
            load_failures: self.load_failures + other.load_failures,
            cache_hits: self.cache_hits + other.cache_hits,
            evictions: self.evictions + other.evictions,
            bytes_loaded: self.bytes_loaded + other.bytes_loaded,
            bytes_evicted: self.bytes_evicted + other.bytes_evicted,
        }
    }
}

//! Running resize statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Counters and running averages for a [`ResizePipeline`](crate::ResizePipeline).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResizeStats {
    /// Images resized (cache misses that ran the transformer successfully)
    pub total_processed: u64,
    /// Requests answered from the result cache
    pub cache_hits: u64,
    /// Inputs returned unchanged
    pub passthroughs: u64,
    /// Transforms that failed
    pub errors: u64,
    /// Input kilobytes across resized images
    pub total_original_kb: f64,
    /// Output kilobytes across resized images
    pub total_resized_kb: f64,
    /// `total_resized_kb / total_original_kb`
    pub compression_ratio: f64,
    /// Mean transform time in milliseconds
    pub average_processing_ms: f64,
    /// Time of the last update
    pub last_updated: Option<DateTime<Utc>>,
}

impl ResizeStats {
    pub(crate) fn record_resize(&mut self, original_kb: f64, resized_kb: f64, elapsed: Duration) {
        self.total_processed += 1;
        self.total_original_kb += original_kb;
        self.total_resized_kb += resized_kb;
        if self.total_original_kb > 0.0 {
            self.compression_ratio = self.total_resized_kb / self.total_original_kb;
        }
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        self.average_processing_ms +=
            (elapsed_ms - self.average_processing_ms) / self.total_processed as f64;
        self.touch();
    }

    pub(crate) fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
        self.touch();
    }

    pub(crate) fn record_passthrough(&mut self) {
        self.passthroughs += 1;
        self.touch();
    }

    pub(crate) fn record_error(&mut self) {
        self.errors += 1;
        self.touch();
    }

    fn touch(&mut self) {
        self.last_updated = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_mean_and_ratio() {
        let mut stats = ResizeStats::default();
        stats.record_resize(1000.0, 200.0, Duration::from_millis(10));
        stats.record_resize(1000.0, 300.0, Duration::from_millis(30));
        assert_eq!(stats.total_processed, 2);
        assert!((stats.compression_ratio - 0.25).abs() < 1e-9);
        assert!((stats.average_processing_ms - 20.0).abs() < 1e-6);
        assert!(stats.last_updated.is_some());
    }
}

//! Cache Statistics Module
//!
//! Tracks content hits and misses, load outcomes, and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Content reads that found a loaded entry
    pub hits: u64,
    /// Content reads that found nothing loaded
    pub misses: u64,
    /// Loads that transitioned an entry to `Loading`
    pub loads_started: u64,
    /// Loads that ended in `Loaded`
    pub loads_succeeded: u64,
    /// Loads that ended in `Failed`
    pub loads_failed: u64,
    /// Results discarded because their task was cancelled or superseded
    pub results_discarded: u64,
    /// Entries removed by sweeps or explicit eviction
    pub evictions: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Video loads holding an admission slot
    pub active_video_loads: usize,
    /// Video loads waiting for a slot
    pub pending_video_loads: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the content hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_load_started(&mut self) {
        self.loads_started += 1;
    }

    pub fn record_load_succeeded(&mut self) {
        self.loads_succeeded += 1;
    }

    pub fn record_load_failed(&mut self) {
        self.loads_failed += 1;
    }

    pub fn record_discarded(&mut self) {
        self.results_discarded += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }
}

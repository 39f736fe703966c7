//! Cache Statistics Module
//!
//! Tracks hits, misses and entry movement between tiers.

use serde::Serialize;

// == Cache Stats ==
/// Counters maintained by a two-level cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups that found their key
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries dropped from the slow tier to make room
    pub evictions: u64,
    /// Entries moved from the fast tier to the slow tier
    pub demotions: u64,
    /// Entries moved from the slow tier to the fast tier
    pub promotions: u64,
    /// Completed rebalance passes
    pub rebalances: u64,
    /// Current number of entries across both tiers
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Events ==
    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Increments the eviction counter.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Increments the demotion counter.
    pub fn record_demotion(&mut self) {
        self.demotions += 1;
    }

    /// Increments the promotion counter.
    pub fn record_promotion(&mut self) {
        self.promotions += 1;
    }

    /// Increments the completed rebalance counter.
    pub fn record_rebalance(&mut self) {
        self.rebalances += 1;
    }

    // == Update Entry Count ==
    /// Updates the total entries count.
    ///
    /// # Arguments
    /// * `count` - Current number of entries across both tiers
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

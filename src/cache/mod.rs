//! Cache Module
//!
//! Two-level caching: a small fast tier in front of a larger slow tier, each
//! evicting by LFU, LRU or MRU score, with periodic rebalancing between them.

mod clock;
mod entry;
mod score_index;
mod shared;
mod stats;
mod store;
mod strategy;
mod tier;
mod two_level;
mod usage;

#[cfg(test)]
mod test_support;

use std::fmt::Debug;

// Re-export public types
pub use clock::monotonic_now;
pub use entry::Entry;
pub use score_index::{Score, ScoreIndex};
pub use shared::SharedCache;
pub use stats::CacheStats;
pub use store::{BlobStore, MemoryStore, ValueStore};
pub use strategy::EvictionStrategy;
pub use tier::CacheTier;
pub use two_level::{TwoLevelCache, REBALANCE_PERIOD};
pub use usage::CacheUsage;

use crate::error::Result;

// == Key / Value Bounds ==
/// Requirements on cache keys: totally ordered so ties break deterministically.
pub trait CacheKey: Ord + Clone + Debug + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Ord + Clone + Debug + Send + Sync + 'static {}

/// Requirements on cached values. Lookups return copies.
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + 'static {}

// == Cache Contract ==
/// Operations shared by a single tier and the two-level cache.
pub trait Cache<K, V> {
    /// Inserts or overwrites a value.
    fn put(&mut self, key: K, value: V) -> Result<()>;

    /// Returns a copy of the value and refreshes its score.
    fn get(&mut self, key: &K) -> Result<Option<V>>;

    /// Deletes the key. Returns false when it was absent.
    fn delete(&mut self, key: &K) -> Result<bool>;

    /// Deletes the key and returns its value.
    fn remove(&mut self, key: &K) -> Result<Option<V>>;

    fn clear(&mut self) -> Result<()>;

    fn contains(&self, key: &K) -> bool;

    /// Number of entries held.
    fn size(&self) -> usize;

    fn has_empty_space(&self) -> bool;

    fn current_strategy(&self) -> EvictionStrategy;

    /// Makes room for one new entry.
    fn free_space(&mut self) -> Result<()>;
}

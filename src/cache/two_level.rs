//! Two-Level Cache Module
//!
//! Orchestrates a fast tier and a slow tier: placement of new keys, the
//! free-space procedure, and the periodic rebalance that swaps entries
//! between tiers based on their scores.
//!
//! A key lives in at most one tier at a time. Entries move between tiers as
//! [`Entry`] values so their scores travel with them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{BackendLayout, FileBackend, SingleFileBackend, StorageBackend};
use crate::cache::entry::Entry;
use crate::cache::stats::CacheStats;
use crate::cache::strategy::EvictionStrategy;
use crate::cache::tier::CacheTier;
use crate::cache::usage::CacheUsage;
use crate::cache::{Cache, CacheKey, CacheValue};
use crate::config::Config;
use crate::error::{CacheError, Result};

/// Number of `get` calls between two rebalance passes.
pub const REBALANCE_PERIOD: usize = 20;

// == Two Level Cache ==
/// A fast tier in front of a slow tier behind one [`Cache`] contract.
pub struct TwoLevelCache<K, V> {
    /// Small, low-latency tier
    fast: CacheTier<K, V>,
    /// Larger, durable tier
    slow: CacheTier<K, V>,
    /// Strategy both tiers were built with
    strategy: EvictionStrategy,
    /// Lookups between rebalance passes
    rebalance_period: usize,
    /// Lookups since the last pass, always below `rebalance_period`
    calls_since_rebalance: usize,
    stats: CacheStats,
}

impl<K, V> TwoLevelCache<K, V>
where
    K: CacheKey,
    V: CacheValue,
{
    // == Constructors ==
    /// Creates a cache with an in-memory fast tier and a slow tier written
    /// through `backend`.
    ///
    /// # Arguments
    /// * `fast_capacity` - Maximum entries in the fast tier
    /// * `slow_capacity` - Maximum entries in the slow tier
    /// * `strategy` - Eviction strategy shared by both tiers
    /// * `backend` - Storage the slow tier writes through
    pub fn new<B>(
        fast_capacity: usize,
        slow_capacity: usize,
        strategy: EvictionStrategy,
        backend: B,
    ) -> Result<Self>
    where
        B: StorageBackend<V> + 'static,
    {
        Self::from_tiers(
            CacheTier::in_memory(fast_capacity, strategy),
            CacheTier::persistent(slow_capacity, strategy, backend),
            REBALANCE_PERIOD,
        )
    }

    /// Creates a cache whose both tiers live in memory.
    pub fn in_memory(
        fast_capacity: usize,
        slow_capacity: usize,
        strategy: EvictionStrategy,
    ) -> Result<Self> {
        Self::from_tiers(
            CacheTier::in_memory(fast_capacity, strategy),
            CacheTier::in_memory(slow_capacity, strategy),
            REBALANCE_PERIOD,
        )
    }

    /// Assembles a cache from two prepared tiers.
    ///
    /// Both tiers need a capacity of at least one and the same strategy
    /// variant; the period must be at least one.
    ///
    /// # Arguments
    /// * `fast` - Tier consulted first and filled first
    /// * `slow` - Tier new keys overflow into
    /// * `rebalance_period` - Lookups between rebalance passes
    pub fn from_tiers(
        fast: CacheTier<K, V>,
        slow: CacheTier<K, V>,
        rebalance_period: usize,
    ) -> Result<Self> {
        if fast.capacity() == 0 || slow.capacity() == 0 {
            return Err(CacheError::InvalidConfig(
                "tier capacities must be at least 1".to_string(),
            ));
        }
        if rebalance_period == 0 {
            return Err(CacheError::InvalidConfig(
                "rebalance period must be at least 1".to_string(),
            ));
        }
        if fast.strategy() != slow.strategy() {
            return Err(CacheError::InvalidConfig(format!(
                "tiers use different strategies ({} and {})",
                fast.strategy(),
                slow.strategy()
            )));
        }

        let mut stats = CacheStats::new();
        stats.set_total_entries(fast.len() + slow.len());

        Ok(Self {
            strategy: fast.strategy(),
            fast,
            slow,
            rebalance_period,
            calls_since_rebalance: 0,
            stats,
        })
    }

    // == Put ==
    /// Stores `value` under `key`.
    ///
    /// A key already cached is overwritten in the tier that holds it. A new
    /// key goes to the fast tier if it has room, else to the slow tier, else
    /// the free-space procedure runs and the key goes to the fast tier.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    pub fn put(&mut self, key: K, value: V) -> Result<()> {
        if self.fast.contains(&key) {
            debug!("Overwriting key {:?} in fast tier", key);
            return self.fast.put(key, value);
        }
        if self.slow.contains(&key) {
            debug!("Overwriting key {:?} in slow tier", key);
            return self.slow.put(key, value);
        }

        if self.fast.has_space() {
            debug!("Put key {:?} into fast tier", key);
            self.fast.put(key, value)
        } else if self.slow.has_space() {
            debug!("Put key {:?} into slow tier", key);
            self.slow.put(key, value)
        } else {
            self.free_space()?;
            debug!("Put key {:?} into fast tier after freeing space", key);
            self.fast.put(key, value)
        }
    }

    // == Get ==
    /// Looks up `key`, refreshing its score in the tier that holds it.
    ///
    /// Every call counts towards the rebalance period; the pass that falls due
    /// runs before the lookup is resolved.
    ///
    /// # Arguments
    /// * `key` - The key to look up
    pub fn get(&mut self, key: &K) -> Result<Option<V>> {
        self.count_call_and_rebalance()?;

        let value = if self.fast.contains(key) {
            self.fast.get(key)?
        } else if self.slow.contains(key) {
            self.slow.get(key)?
        } else {
            None
        };

        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        Ok(value)
    }

    fn count_call_and_rebalance(&mut self) -> Result<()> {
        self.calls_since_rebalance += 1;
        if self.calls_since_rebalance >= self.rebalance_period {
            self.calls_since_rebalance = 0;
            self.rebalance()?;
        }
        Ok(())
    }

    // == Delete ==
    /// Deletes `key` from whichever tier holds it. Returns false when absent.
    ///
    /// # Arguments
    /// * `key` - The key to delete
    pub fn delete(&mut self, key: &K) -> Result<bool> {
        if self.fast.contains(key) {
            debug!("Delete key {:?} from fast tier", key);
            self.fast.delete(key)
        } else if self.slow.contains(key) {
            debug!("Delete key {:?} from slow tier", key);
            self.slow.delete(key)
        } else {
            warn!("Key {:?} is absent from cache", key);
            Ok(false)
        }
    }

    // == Remove ==
    /// Removes `key` from whichever tier holds it and returns the value.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>> {
        if self.fast.contains(key) {
            debug!("Remove key {:?} from fast tier", key);
            self.fast.remove(key)
        } else if self.slow.contains(key) {
            debug!("Remove key {:?} from slow tier", key);
            self.slow.remove(key)
        } else {
            warn!("Key {:?} is absent from cache", key);
            Ok(None)
        }
    }

    // == Free Space ==
    /// Drops the slow tier's eviction candidate, then demotes the fast tier's
    /// eviction candidate into the slot that opened up.
    ///
    /// Both steps always run, even when the slow tier had room already.
    /// Empty tiers are skipped.
    pub fn free_space(&mut self) -> Result<()> {
        if let Some(evicted) = self.slow.discard_candidate()? {
            self.stats.record_eviction();
            debug!("Evicted key {:?} from slow tier ({})", evicted, self.strategy);
        }

        let Some(key) = self.fast.eviction_candidate() else {
            return Ok(());
        };
        let entry = take_candidate(&mut self.fast, &key)?;
        if let Err(e) = self.slow.transfer_in(entry.clone()) {
            restore(&mut self.fast, entry);
            return Err(e);
        }

        self.stats.record_demotion();
        debug!("Demoted key {:?} to slow tier", key);
        Ok(())
    }

    // == Eviction Target ==
    /// Key the next free-space procedure would drop from the cache.
    pub fn eviction_target(&self) -> Option<K> {
        self.slow.eviction_candidate()
    }

    // == Rebalance ==
    /// Swaps up to `size() / 4` pairs between the tiers.
    ///
    /// Each swap moves the fast tier's eviction candidate down and the slow
    /// tier's promotion candidate up, both keeping their scores. Stops early
    /// once either tier is empty. Returns the number of swaps made.
    pub fn rebalance(&mut self) -> Result<usize> {
        let rounds = self.size() / 4;
        let mut swaps = 0;

        for _ in 0..rounds {
            if !self.swap_once()? {
                break;
            }
            swaps += 1;
        }

        self.stats.record_rebalance();
        info!("Rebalance pass swapped {} of {} planned pairs", swaps, rounds);
        Ok(swaps)
    }

    fn swap_once(&mut self) -> Result<bool> {
        let (Some(down_key), Some(up_key)) =
            (self.fast.eviction_candidate(), self.slow.promotion_candidate())
        else {
            return Ok(false);
        };

        let demoted = take_candidate(&mut self.fast, &down_key)?;
        let promoted = match take_candidate(&mut self.slow, &up_key) {
            Ok(entry) => entry,
            Err(e) => {
                restore(&mut self.fast, demoted);
                return Err(e);
            }
        };

        if let Err(e) = self.fast.transfer_in(promoted.clone()) {
            restore(&mut self.slow, promoted);
            restore(&mut self.fast, demoted);
            return Err(e);
        }
        if let Err(e) = self.slow.transfer_in(demoted.clone()) {
            if let Err(undo) = self.fast.take_entry(&promoted.key) {
                error!("Failed to undo promotion of key {:?}: {}", promoted.key, undo);
            }
            restore(&mut self.slow, promoted);
            restore(&mut self.fast, demoted);
            return Err(e);
        }

        self.stats.record_promotion();
        self.stats.record_demotion();
        debug!(
            "Rebalance swapped {:?} (score {}) down and {:?} (score {}) up",
            demoted.key, demoted.score, promoted.key, promoted.score
        );
        Ok(true)
    }

    // == Clear ==
    /// Empties both tiers and releases the slow tier's backing storage.
    pub fn clear(&mut self) -> Result<()> {
        self.slow.clear()?;
        self.fast.clear()?;
        info!("Cache cleared");
        Ok(())
    }

    // == Queries ==
    /// Checks whether either tier holds `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.fast.contains(key) || self.slow.contains(key)
    }

    /// Entries across both tiers.
    pub fn size(&self) -> usize {
        self.fast.len() + self.slow.len()
    }

    /// True while the combined capacity exceeds the combined size.
    pub fn has_empty_space(&self) -> bool {
        self.fast.capacity() + self.slow.capacity() > self.size()
    }

    /// Strategy both tiers were built with.
    pub fn current_strategy(&self) -> EvictionStrategy {
        self.strategy
    }

    /// Lookups between two rebalance passes.
    pub fn rebalance_period(&self) -> usize {
        self.rebalance_period
    }

    /// Lookups counted since the last rebalance pass.
    pub fn calls_since_rebalance(&self) -> usize {
        self.calls_since_rebalance
    }

    // == Tier Access ==
    /// Read-only view of the fast tier.
    pub fn fast_tier(&self) -> &CacheTier<K, V> {
        &self.fast
    }

    /// Read-only view of the slow tier.
    pub fn slow_tier(&self) -> &CacheTier<K, V> {
        &self.slow
    }

    // == Stats ==
    /// Returns current statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.size());
        stats
    }

    // == Usage ==
    /// Snapshot of the keys and scores in each tier.
    pub fn usage(&self) -> CacheUsage<K> {
        CacheUsage {
            strategy: self.strategy,
            fast_tier: self.fast.scores().map(|(k, s)| (k.clone(), s)).collect(),
            slow_tier: self.slow.scores().map(|(k, s)| (k.clone(), s)).collect(),
        }
    }
}

impl<K, V> TwoLevelCache<K, V>
where
    K: CacheKey,
    V: CacheValue + Serialize + DeserializeOwned,
{
    /// Builds a cache from configuration, with the slow tier stored on disk
    /// under a fresh subdirectory or file of `config.cache_dir`.
    ///
    /// # Arguments
    /// * `config` - Capacities, strategy, period and on-disk layout
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let strategy = config.strategy;
        let fast = CacheTier::in_memory(config.fast_tier_capacity, strategy);
        let slow = match config.backend_layout {
            BackendLayout::PerValue => {
                let dir = config.cache_dir.join(Uuid::new_v4().to_string());
                let backend = FileBackend::new(&dir).map_err(|e| {
                    CacheError::InvalidConfig(format!("cannot open {}: {}", dir.display(), e))
                })?;
                CacheTier::persistent(config.slow_tier_capacity, strategy, backend)
            }
            BackendLayout::SingleFile => {
                let path = config.cache_dir.join(format!("{}.json", Uuid::new_v4()));
                let backend = SingleFileBackend::<V>::new(&path).map_err(|e| {
                    CacheError::InvalidConfig(format!("cannot open {}: {}", path.display(), e))
                })?;
                CacheTier::persistent(config.slow_tier_capacity, strategy, backend)
            }
        };

        Self::from_tiers(fast, slow, config.rebalance_period)
    }
}

fn take_candidate<K: CacheKey, V: CacheValue>(
    tier: &mut CacheTier<K, V>,
    key: &K,
) -> Result<Entry<K, V>> {
    tier.take_entry(key)?.ok_or(CacheError::EmptyIndex)
}

/// Puts an entry back into the tier it was taken from after a failed move.
fn restore<K: CacheKey, V: CacheValue>(tier: &mut CacheTier<K, V>, entry: Entry<K, V>) {
    let key = entry.key.clone();
    if let Err(e) = tier.transfer_in(entry) {
        error!("Failed to restore key {:?} after an aborted move: {}", key, e);
    }
}

impl<K, V> std::fmt::Debug for TwoLevelCache<K, V>
where
    K: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoLevelCache")
            .field("fast", &self.fast)
            .field("slow", &self.slow)
            .field("strategy", &self.strategy)
            .field("calls_since_rebalance", &self.calls_since_rebalance)
            .finish()
    }
}

impl<K, V> Cache<K, V> for TwoLevelCache<K, V>
where
    K: CacheKey,
    V: CacheValue,
{
    fn put(&mut self, key: K, value: V) -> Result<()> {
        TwoLevelCache::put(self, key, value)
    }

    fn get(&mut self, key: &K) -> Result<Option<V>> {
        TwoLevelCache::get(self, key)
    }

    fn delete(&mut self, key: &K) -> Result<bool> {
        TwoLevelCache::delete(self, key)
    }

    fn remove(&mut self, key: &K) -> Result<Option<V>> {
        TwoLevelCache::remove(self, key)
    }

    fn clear(&mut self) -> Result<()> {
        TwoLevelCache::clear(self)
    }

    fn contains(&self, key: &K) -> bool {
        TwoLevelCache::contains(self, key)
    }

    fn size(&self) -> usize {
        TwoLevelCache::size(self)
    }

    fn has_empty_space(&self) -> bool {
        TwoLevelCache::has_empty_space(self)
    }

    fn current_strategy(&self) -> EvictionStrategy {
        self.strategy
    }

    fn free_space(&mut self) -> Result<()> {
        TwoLevelCache::free_space(self)
    }
}

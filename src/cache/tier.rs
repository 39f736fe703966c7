//! Cache Tier Module
//!
//! A single capacity-bounded level: a value store plus a score index kept in
//! lock-step, with the tier's own eviction strategy.

use std::fmt;

use tracing::debug;

use crate::backend::StorageBackend;
use crate::cache::entry::Entry;
use crate::cache::score_index::{Score, ScoreIndex};
use crate::cache::store::{BlobStore, MemoryStore, ValueStore};
use crate::cache::strategy::EvictionStrategy;
use crate::cache::{Cache, CacheKey, CacheValue};
use crate::error::{CacheError, Result};

// == Cache Tier ==
/// One bounded cache level, in memory or backed by a [`StorageBackend`].
///
/// After every public call the value store and the score index hold exactly
/// the same keys.
pub struct CacheTier<K, V> {
    /// Key → value storage
    store: Box<dyn ValueStore<K, V>>,
    /// Key → score, ordered for candidate selection
    scores: ScoreIndex<K>,
    /// This tier's own strategy instance
    strategy: EvictionStrategy,
    /// Maximum number of entries, fixed at construction
    capacity: usize,
}

impl<K, V> CacheTier<K, V>
where
    K: CacheKey,
    V: CacheValue,
{
    // == Constructors ==
    /// Creates a tier that keeps values in process memory.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries the tier can hold
    /// * `strategy` - Eviction strategy used for scoring and candidates
    pub fn in_memory(capacity: usize, strategy: EvictionStrategy) -> Self {
        Self::with_store(capacity, strategy, Box::new(MemoryStore::new()))
    }

    /// Creates a tier that writes values through `backend`.
    ///
    /// The backend must not be shared with any other tier.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries the tier can hold
    /// * `strategy` - Eviction strategy used for scoring and candidates
    /// * `backend` - Storage the values are written through
    pub fn persistent<B>(capacity: usize, strategy: EvictionStrategy, backend: B) -> Self
    where
        B: StorageBackend<V> + 'static,
    {
        Self::with_store(capacity, strategy, Box::new(BlobStore::new(Box::new(backend))))
    }

    /// Creates a tier over an arbitrary value store.
    pub fn with_store(
        capacity: usize,
        strategy: EvictionStrategy,
        store: Box<dyn ValueStore<K, V>>,
    ) -> Self {
        Self {
            store,
            scores: ScoreIndex::new(),
            strategy,
            capacity,
        }
    }

    // == Put ==
    /// Stores `value` under `key` with a fresh initial score.
    ///
    /// A new key in a full tier first pushes out the tier's own eviction
    /// candidate. Overwriting a present key never evicts. On failure the tier
    /// is left exactly as it was.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    pub fn put(&mut self, key: K, value: V) -> Result<()> {
        let is_overwrite = self.contains(&key);

        if !is_overwrite && self.scores.len() >= self.capacity {
            let victim = self
                .eviction_candidate()
                .ok_or(CacheError::CapacityExceeded {
                    capacity: self.capacity,
                })?;
            self.store
                .write_evicting(key.clone(), value, &victim)
                .map_err(|e| CacheError::backend(&key, e))?;
            self.scores.remove(&victim);
            debug!("Evicted key {:?} to make room for {:?}", victim, key);
        } else {
            self.store
                .write(key.clone(), value)
                .map_err(|e| CacheError::backend(&key, e))?;
        }

        self.scores.insert_or_update(key, self.strategy.initial_score());
        Ok(())
    }

    // == Get ==
    /// Returns a copy of the value and refreshes its score.
    ///
    /// The score is left untouched when the backend read fails.
    ///
    /// # Arguments
    /// * `key` - The key to look up
    pub fn get(&mut self, key: &K) -> Result<Option<V>> {
        let Some(old) = self.scores.get(key) else {
            return Ok(None);
        };

        let value = self
            .store
            .read(key)
            .map_err(|e| CacheError::backend(key, e))?;

        if value.is_some() {
            self.scores
                .insert_or_update(key.clone(), self.strategy.refresh_score(old));
        }
        Ok(value)
    }

    // == Remove ==
    /// Removes the entry and returns its value.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>> {
        Ok(self.take_entry(key)?.map(|entry| entry.value))
    }

    // == Delete ==
    /// Removes the entry without reading its value. Returns whether it existed.
    pub fn delete(&mut self, key: &K) -> Result<bool> {
        let existed = self
            .store
            .discard(key)
            .map_err(|e| CacheError::backend(key, e))?;
        self.scores.remove(key);
        Ok(existed)
    }

    // == Take Entry ==
    /// Removes the entry and returns it together with its score.
    pub fn take_entry(&mut self, key: &K) -> Result<Option<Entry<K, V>>> {
        let Some(score) = self.scores.get(key) else {
            return Ok(None);
        };

        let value = self
            .store
            .take(key)
            .map_err(|e| CacheError::backend(key, e))?;
        self.scores.remove(key);

        Ok(value.map(|value| Entry::new(key.clone(), value, score)))
    }

    // == Transfer In ==
    /// Inserts an entry moved from another tier, keeping its score.
    ///
    /// Unlike `put` this never evicts: the caller must have made room first,
    /// otherwise `CapacityExceeded` is returned and nothing changes.
    ///
    /// # Arguments
    /// * `entry` - Key, value and score taken out of the source tier
    pub fn transfer_in(&mut self, entry: Entry<K, V>) -> Result<()> {
        let Entry { key, value, score } = entry;

        if !self.contains(&key) && !self.has_space() {
            return Err(CacheError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        self.store
            .write(key.clone(), value)
            .map_err(|e| CacheError::backend(&key, e))?;
        self.scores.insert_or_update(key, score);
        Ok(())
    }

    // == Eviction ==
    /// Removes and returns the tier's eviction candidate, or `None` when empty.
    pub fn evict_one(&mut self) -> Result<Option<Entry<K, V>>> {
        match self.eviction_candidate() {
            Some(key) => self.take_entry(&key),
            None => Ok(None),
        }
    }

    // == Discard Candidate ==
    /// Deletes the eviction candidate without reading its value.
    pub fn discard_candidate(&mut self) -> Result<Option<K>> {
        let Some(key) = self.eviction_candidate() else {
            return Ok(None);
        };
        self.delete(&key)?;
        Ok(Some(key))
    }

    // == Candidates ==
    /// Key the strategy would evict next.
    pub fn eviction_candidate(&self) -> Option<K> {
        self.strategy.eviction_candidate(&self.scores).ok().cloned()
    }

    /// Key the strategy would lift into a faster tier, left in place.
    pub fn promotion_candidate(&self) -> Option<K> {
        self.strategy.promotion_candidate(&self.scores).ok().cloned()
    }

    // == Clear ==
    /// Removes every entry, releasing backing storage for persistent tiers.
    ///
    /// When the backend fails part way, the entries it already released are
    /// gone from both the value store and the score index; the rest stay
    /// readable and the first failure is returned.
    pub fn clear(&mut self) -> Result<()> {
        match self.store.clear() {
            Ok(()) => {
                self.scores.clear();
                Ok(())
            }
            Err(e) => {
                let released: Vec<K> = self
                    .scores
                    .iter()
                    .filter(|(key, _)| !self.store.contains(key))
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in &released {
                    self.scores.remove(key);
                }
                Err(CacheError::Backend {
                    key: "*".to_string(),
                    source: e,
                })
            }
        }
    }

    // == Contains ==
    /// Checks whether the tier holds `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.store.contains(key)
    }

    // == Size ==
    /// Returns the number of entries in the tier.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if the tier holds no entries.
    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Maximum number of entries, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True while the tier holds fewer entries than its capacity.
    pub fn has_space(&self) -> bool {
        self.len() < self.capacity
    }

    // == Accessors ==
    /// Strategy this tier scores and picks candidates with.
    pub fn strategy(&self) -> EvictionStrategy {
        self.strategy
    }

    /// True when values live in a storage backend.
    pub fn is_persistent(&self) -> bool {
        self.store.is_persistent()
    }

    /// Current score of `key`.
    pub fn score_of(&self, key: &K) -> Option<Score> {
        self.scores.get(key)
    }

    /// Entries of the score index, in key order.
    pub fn scores(&self) -> impl Iterator<Item = (&K, Score)> {
        self.scores.iter()
    }

    /// Keys of the value store, in key order.
    pub fn stored_keys(&self) -> Vec<K> {
        self.store.keys()
    }
}

impl<K: fmt::Debug, V> fmt::Debug for CacheTier<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheTier")
            .field("capacity", &self.capacity)
            .field("strategy", &self.strategy)
            .field("scores", &self.scores)
            .finish_non_exhaustive()
    }
}

impl<K, V> Cache<K, V> for CacheTier<K, V>
where
    K: CacheKey,
    V: CacheValue,
{
    fn put(&mut self, key: K, value: V) -> Result<()> {
        CacheTier::put(self, key, value)
    }

    fn get(&mut self, key: &K) -> Result<Option<V>> {
        CacheTier::get(self, key)
    }

    fn delete(&mut self, key: &K) -> Result<bool> {
        CacheTier::delete(self, key)
    }

    fn remove(&mut self, key: &K) -> Result<Option<V>> {
        CacheTier::remove(self, key)
    }

    fn clear(&mut self) -> Result<()> {
        CacheTier::clear(self)
    }

    fn contains(&self, key: &K) -> bool {
        CacheTier::contains(self, key)
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn has_empty_space(&self) -> bool {
        self.has_space()
    }

    fn current_strategy(&self) -> EvictionStrategy {
        self.strategy
    }

    fn free_space(&mut self) -> Result<()> {
        self.discard_candidate()?.ok_or(CacheError::EmptyIndex)?;
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::cache::test_support::{assert_lock_step, FlakyBackend, UNLIMITED_DELETES};
    use std::sync::atomic::Ordering;

    fn lfu_tier(capacity: usize) -> CacheTier<u32, String> {
        CacheTier::in_memory(capacity, EvictionStrategy::LeastFrequentlyUsed)
    }

    #[test]
    fn test_tier_put_and_get() {
        let mut tier = lfu_tier(4);
        tier.put(1, "one".to_string()).unwrap();

        assert_eq!(tier.get(&1).unwrap(), Some("one".to_string()));
        assert_eq!(tier.score_of(&1), Some(2));
        assert_eq!(tier.get(&2).unwrap(), None);
        assert_lock_step(&tier);
    }

    #[test]
    fn test_tier_put_evicts_when_full() {
        let mut tier = lfu_tier(2);
        tier.put(1, "one".to_string()).unwrap();
        tier.put(2, "two".to_string()).unwrap();
        tier.get(&1).unwrap();

        tier.put(3, "three".to_string()).unwrap();

        assert_eq!(tier.len(), 2);
        assert!(tier.contains(&1));
        assert!(!tier.contains(&2));
        assert!(tier.contains(&3));
        assert_lock_step(&tier);
    }

    #[test]
    fn test_tier_overwrite_resets_score_without_evicting() {
        let mut tier = lfu_tier(2);
        tier.put(1, "one".to_string()).unwrap();
        tier.put(2, "two".to_string()).unwrap();
        tier.get(&1).unwrap();
        tier.get(&1).unwrap();

        tier.put(1, "uno".to_string()).unwrap();

        assert_eq!(tier.len(), 2);
        assert_eq!(tier.score_of(&1), Some(1));
        assert_eq!(tier.get(&1).unwrap(), Some("uno".to_string()));
    }

    #[test]
    fn test_tier_zero_capacity_rejects_put() {
        let mut tier = lfu_tier(0);
        let result = tier.put(1, "one".to_string());

        assert!(matches!(result, Err(CacheError::CapacityExceeded { capacity: 0 })));
        assert!(tier.is_empty());
        assert_lock_step(&tier);
    }

    #[test]
    fn test_tier_remove_and_delete() {
        let mut tier = lfu_tier(4);
        tier.put(1, "one".to_string()).unwrap();
        tier.put(2, "two".to_string()).unwrap();

        assert_eq!(tier.remove(&1).unwrap(), Some("one".to_string()));
        assert_eq!(tier.remove(&1).unwrap(), None);
        assert!(tier.delete(&2).unwrap());
        assert!(!tier.delete(&2).unwrap());
        assert!(tier.is_empty());
        assert_lock_step(&tier);
    }

    #[test]
    fn test_tier_transfer_keeps_score() {
        let mut tier = lfu_tier(2);
        tier.transfer_in(Entry::new(7, "seven".to_string(), 42)).unwrap();

        assert_eq!(tier.score_of(&7), Some(42));
        assert_eq!(tier.get(&7).unwrap(), Some("seven".to_string()));
        assert_eq!(tier.score_of(&7), Some(43));
    }

    #[test]
    fn test_tier_transfer_into_full_tier_fails() {
        let mut tier = lfu_tier(1);
        tier.put(1, "one".to_string()).unwrap();

        let result = tier.transfer_in(Entry::new(2, "two".to_string(), 5));

        assert!(matches!(result, Err(CacheError::CapacityExceeded { capacity: 1 })));
        assert_eq!(tier.len(), 1);
        assert!(!tier.contains(&2));
        assert_lock_step(&tier);
    }

    #[test]
    fn test_tier_evict_one_returns_entry() {
        let mut tier = lfu_tier(3);
        tier.put(1, "one".to_string()).unwrap();
        tier.put(2, "two".to_string()).unwrap();
        tier.get(&1).unwrap();

        let evicted = tier.evict_one().unwrap().unwrap();
        assert_eq!(evicted, Entry::new(2, "two".to_string(), 1));

        tier.evict_one().unwrap();
        assert!(tier.evict_one().unwrap().is_none());
    }

    #[test]
    fn test_tier_candidates() {
        let mut tier = CacheTier::in_memory(3, EvictionStrategy::MostRecentlyUsed);
        tier.put(1, "one".to_string()).unwrap();
        tier.put(2, "two".to_string()).unwrap();
        tier.put(3, "three".to_string()).unwrap();
        tier.get(&2).unwrap();

        assert_eq!(tier.eviction_candidate(), Some(2));
        assert_eq!(tier.promotion_candidate(), Some(1));
        assert_eq!(tier.len(), 3);
    }

    #[test]
    fn test_tier_free_space() {
        let mut tier = lfu_tier(2);
        assert!(matches!(Cache::free_space(&mut tier), Err(CacheError::EmptyIndex)));

        tier.put(1, "one".to_string()).unwrap();
        Cache::free_space(&mut tier).unwrap();
        assert_eq!(Cache::size(&tier), 0);
    }

    #[test]
    fn test_persistent_tier_roundtrip() {
        let mut tier = CacheTier::persistent(
            2,
            EvictionStrategy::LeastRecentlyUsed,
            MemoryBackend::<String>::new(),
        );
        assert!(tier.is_persistent());

        tier.put(1, "one".to_string()).unwrap();
        tier.put(2, "two".to_string()).unwrap();
        tier.get(&1).unwrap();
        tier.put(3, "three".to_string()).unwrap();

        assert!(!tier.contains(&2));
        assert_eq!(tier.get(&3).unwrap(), Some("three".to_string()));
        tier.clear().unwrap();
        assert!(tier.is_empty());
        assert_lock_step(&tier);
    }

    #[test]
    fn test_failed_store_leaves_tier_unchanged() {
        let backend = FlakyBackend::default();
        let fail_store = backend.fail_store.clone();
        let mut tier = CacheTier::persistent(1, EvictionStrategy::LeastFrequentlyUsed, backend);
        tier.put(1, "one".to_string()).unwrap();

        fail_store.store(true, Ordering::SeqCst);
        let result = tier.put(2, "two".to_string());

        assert!(matches!(result, Err(CacheError::Backend { .. })));
        assert!(tier.contains(&1));
        assert!(!tier.contains(&2));
        assert_eq!(tier.score_of(&1), Some(1));
        assert_lock_step(&tier);
    }

    #[test]
    fn test_failed_eviction_rolls_back_put() {
        let backend = FlakyBackend::default();
        let fail_delete = backend.fail_delete.clone();
        let mut tier = CacheTier::persistent(1, EvictionStrategy::LeastFrequentlyUsed, backend);
        tier.put(1, "one".to_string()).unwrap();

        fail_delete.store(true, Ordering::SeqCst);
        let result = tier.put(2, "two".to_string());
        fail_delete.store(false, Ordering::SeqCst);

        assert!(matches!(result, Err(CacheError::Backend { .. })));
        assert_eq!(tier.stored_keys(), vec![1]);
        assert_lock_step(&tier);
    }

    #[test]
    fn test_failed_load_keeps_score() {
        let backend = FlakyBackend::default();
        let fail_load = backend.fail_load.clone();
        let mut tier = CacheTier::persistent(2, EvictionStrategy::LeastFrequentlyUsed, backend);
        tier.put(1, "one".to_string()).unwrap();

        fail_load.store(true, Ordering::SeqCst);
        let get = tier.get(&1);
        let remove = tier.remove(&1);

        assert!(matches!(get, Err(CacheError::Backend { .. })));
        assert!(matches!(remove, Err(CacheError::Backend { .. })));
        assert_eq!(tier.score_of(&1), Some(1));
        assert!(tier.contains(&1));
        assert_lock_step(&tier);
    }

    #[test]
    fn test_partial_clear_keeps_remaining_entries_readable() {
        let backend = FlakyBackend::default();
        let switches = backend.switches();
        let mut tier = CacheTier::persistent(2, EvictionStrategy::LeastFrequentlyUsed, backend);
        tier.put(1, "one".to_string()).unwrap();
        tier.put(2, "two".to_string()).unwrap();

        // Backend releases the first blob, then fails on the second.
        switches.delete_budget.store(1, Ordering::SeqCst);
        let result = tier.clear();

        assert!(matches!(result, Err(CacheError::Backend { .. })));
        assert!(!tier.contains(&1));
        assert_eq!(tier.score_of(&1), None);
        assert!(tier.contains(&2));
        assert_eq!(tier.get(&2).unwrap(), Some("two".to_string()));
        assert_lock_step(&tier);

        switches.delete_budget.store(UNLIMITED_DELETES, Ordering::SeqCst);
        assert!(tier.delete(&2).unwrap());
        assert!(tier.is_empty());
        assert_lock_step(&tier);
    }

    #[test]
    fn test_failed_backend_clear_after_release_empties_tier() {
        let backend = FlakyBackend::default();
        let switches = backend.switches();
        let mut tier = CacheTier::persistent(2, EvictionStrategy::LeastRecentlyUsed, backend);
        tier.put(1, "one".to_string()).unwrap();
        tier.put(2, "two".to_string()).unwrap();

        switches.fail_clear.store(true, Ordering::SeqCst);
        let result = tier.clear();

        assert!(matches!(result, Err(CacheError::Backend { .. })));
        assert!(tier.is_empty());
        assert_lock_step(&tier);

        tier.put(3, "three".to_string()).unwrap();
        assert_eq!(tier.get(&3).unwrap(), Some("three".to_string()));
    }
}

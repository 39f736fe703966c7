//! Shared Cache
//!
//! Thread-safe handle over a [`TwoLevelCache`] for concurrent async callers.
//!
//! Every operation that can move entries between tiers, including `get`,
//! holds the write lock for its whole duration, so no caller ever observes a
//! half-finished swap.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cache::stats::CacheStats;
use crate::cache::strategy::EvictionStrategy;
use crate::cache::two_level::TwoLevelCache;
use crate::cache::usage::CacheUsage;
use crate::cache::{CacheKey, CacheValue};
use crate::error::Result;

/// Cloneable handle; all clones point at the same cache.
pub struct SharedCache<K, V> {
    inner: Arc<RwLock<TwoLevelCache<K, V>>>,
}

impl<K, V> Clone for SharedCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> SharedCache<K, V>
where
    K: CacheKey,
    V: CacheValue,
{
    pub fn new(cache: TwoLevelCache<K, V>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(cache)),
        }
    }

    // == Exclusive Operations ==
    pub async fn put(&self, key: K, value: V) -> Result<()> {
        self.inner.write().await.put(key, value)
    }

    /// Lookups can trigger a rebalance, hence the write lock.
    pub async fn get(&self, key: &K) -> Result<Option<V>> {
        self.inner.write().await.get(key)
    }

    pub async fn delete(&self, key: &K) -> Result<bool> {
        self.inner.write().await.delete(key)
    }

    pub async fn remove(&self, key: &K) -> Result<Option<V>> {
        self.inner.write().await.remove(key)
    }

    pub async fn clear(&self) -> Result<()> {
        self.inner.write().await.clear()
    }

    pub async fn free_space(&self) -> Result<()> {
        self.inner.write().await.free_space()
    }

    pub async fn rebalance(&self) -> Result<usize> {
        self.inner.write().await.rebalance()
    }

    // == Shared Queries ==
    pub async fn contains(&self, key: &K) -> bool {
        self.inner.read().await.contains(key)
    }

    pub async fn size(&self) -> usize {
        self.inner.read().await.size()
    }

    pub async fn has_empty_space(&self) -> bool {
        self.inner.read().await.has_empty_space()
    }

    pub async fn current_strategy(&self) -> EvictionStrategy {
        self.inner.read().await.current_strategy()
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.read().await.stats()
    }

    pub async fn usage(&self) -> CacheUsage<K> {
        self.inner.read().await.usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_state() {
        let cache = TwoLevelCache::<u32, String>::in_memory(
            2,
            2,
            EvictionStrategy::LeastRecentlyUsed,
        )
        .unwrap();
        let shared = SharedCache::new(cache);
        let other = shared.clone();

        shared.put(1, "one".to_string()).await.unwrap();

        assert!(other.contains(&1).await);
        assert_eq!(other.get(&1).await.unwrap(), Some("one".to_string()));
        assert!(other.delete(&1).await.unwrap());
        assert_eq!(shared.size().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_puts_respect_capacity() {
        let cache = TwoLevelCache::<u32, u32>::in_memory(
            4,
            4,
            EvictionStrategy::LeastFrequentlyUsed,
        )
        .unwrap();
        let shared = SharedCache::new(cache);

        let mut handles = Vec::new();
        for worker in 0..4u32 {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25u32 {
                    let key = worker * 100 + i;
                    shared.put(key, i).await.unwrap();
                    shared.get(&key).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(shared.size().await, 8);
        assert!(!shared.has_empty_space().await);
        let stats = shared.stats().await;
        assert_eq!(stats.total_entries, 8);
        assert_eq!(stats.hits + stats.misses, 100);
    }
}

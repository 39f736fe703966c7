//! Shared helpers for the cache unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::backend::{BackendError, Locator, MemoryBackend, StorageBackend};
use crate::cache::{CacheKey, CacheTier, CacheValue, TwoLevelCache};

/// Delete budget that never runs out.
pub const UNLIMITED_DELETES: usize = usize::MAX;

/// Backend whose writes, reads and deletes can be made to fail on demand.
pub struct FlakyBackend {
    inner: MemoryBackend<String>,
    pub fail_store: Arc<AtomicBool>,
    pub fail_load: Arc<AtomicBool>,
    pub fail_delete: Arc<AtomicBool>,
    /// Remaining successful deletes, counted down on each delete
    pub delete_budget: Arc<AtomicUsize>,
    /// Makes `clear` drop every blob and then report a failure
    pub fail_clear: Arc<AtomicBool>,
}

impl Default for FlakyBackend {
    fn default() -> Self {
        Self {
            inner: MemoryBackend::new(),
            fail_store: Arc::default(),
            fail_load: Arc::default(),
            fail_delete: Arc::default(),
            delete_budget: Arc::new(AtomicUsize::new(UNLIMITED_DELETES)),
            fail_clear: Arc::default(),
        }
    }
}

/// Shared handles to the failure flags of a [`FlakyBackend`].
#[derive(Clone)]
pub struct FailureSwitches {
    pub fail_store: Arc<AtomicBool>,
    pub fail_load: Arc<AtomicBool>,
    pub fail_delete: Arc<AtomicBool>,
    pub delete_budget: Arc<AtomicUsize>,
    pub fail_clear: Arc<AtomicBool>,
}

impl FlakyBackend {
    pub fn switches(&self) -> FailureSwitches {
        FailureSwitches {
            fail_store: self.fail_store.clone(),
            fail_load: self.fail_load.clone(),
            fail_delete: self.fail_delete.clone(),
            delete_budget: self.delete_budget.clone(),
            fail_clear: self.fail_clear.clone(),
        }
    }

    fn spend_delete(&self) -> bool {
        self.delete_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                UNLIMITED_DELETES => Some(left),
                0 => None,
                _ => Some(left - 1),
            })
            .is_ok()
    }
}

fn injected() -> BackendError {
    BackendError::io("flaky", std::io::Error::other("injected failure"))
}

impl StorageBackend<String> for FlakyBackend {
    fn store(&mut self, value: &String) -> Result<Locator, BackendError> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.store(value)
    }

    fn load(&self, locator: &Locator) -> Result<String, BackendError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.load(locator)
    }

    fn delete(&mut self, locator: &Locator) -> Result<(), BackendError> {
        if self.fail_delete.load(Ordering::SeqCst) || !self.spend_delete() {
            return Err(injected());
        }
        self.inner.delete(locator)
    }

    fn clear(&mut self) -> Result<(), BackendError> {
        self.inner.clear()?;
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(())
    }
}

/// Value store and score index of `tier` hold the same keys.
pub fn assert_lock_step<K: CacheKey, V: CacheValue>(tier: &CacheTier<K, V>) {
    let indexed: Vec<K> = tier.scores().map(|(key, _)| key.clone()).collect();
    assert_eq!(tier.stored_keys(), indexed, "value store and score index diverged");
}

/// Both tiers are in lock-step and share no key.
pub fn assert_cache_invariants<K: CacheKey, V: CacheValue>(cache: &TwoLevelCache<K, V>) {
    assert_lock_step(cache.fast_tier());
    assert_lock_step(cache.slow_tier());
    for key in cache.fast_tier().stored_keys() {
        assert!(
            !cache.slow_tier().contains(&key),
            "key {:?} present in both tiers",
            key
        );
    }
    assert!(cache.size() <= cache.fast_tier().capacity() + cache.slow_tier().capacity());
}

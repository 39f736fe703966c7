//! Value Store Module
//!
//! The value half of a cache tier: either an in-memory map or a map of
//! locators into a [`StorageBackend`]. Every mutating call either fully
//! applies or leaves the store as it was.

use std::collections::BTreeMap;
use std::fmt::Debug;

use tracing::error;

use crate::backend::{BackendError, Locator, StorageBackend};

// == Value Store Trait ==
/// Key → value storage behind a [`CacheTier`](crate::cache::CacheTier).
pub trait ValueStore<K, V>: Send + Sync {
    // == Queries ==
    /// Checks whether a value is stored under `key`.
    fn contains(&self, key: &K) -> bool;

    /// Returns the number of stored values.
    fn len(&self) -> usize;

    /// Keys in ascending order.
    fn keys(&self) -> Vec<K>;

    // == Read ==
    /// Reads a copy of the value.
    ///
    /// # Arguments
    /// * `key` - The key to read
    fn read(&self, key: &K) -> Result<Option<V>, BackendError>;

    // == Write ==
    /// Inserts or replaces the value for `key`.
    ///
    /// # Arguments
    /// * `key` - The key to store under
    /// * `value` - The value to store
    fn write(&mut self, key: K, value: V) -> Result<(), BackendError>;

    /// Inserts the value for a new `key` and drops `victim` in the same step.
    ///
    /// # Arguments
    /// * `key` - The new key to store under
    /// * `value` - The value to store
    /// * `victim` - The key whose value makes room
    fn write_evicting(&mut self, key: K, value: V, victim: &K) -> Result<(), BackendError>;

    // == Removal ==
    /// Removes the value and returns it.
    ///
    /// A persistent value whose blob is already gone is removed and reported
    /// as `None`.
    fn take(&mut self, key: &K) -> Result<Option<V>, BackendError>;

    /// Removes the value without reading it. Returns whether it was present.
    fn discard(&mut self, key: &K) -> Result<bool, BackendError>;

    /// Removes every value.
    ///
    /// On failure the keys whose values were already released are gone; the
    /// others remain stored and readable.
    fn clear(&mut self) -> Result<(), BackendError>;

    /// True when values live outside process memory.
    fn is_persistent(&self) -> bool;
}

// == Memory Store ==
/// Values held directly in a sorted map.
#[derive(Debug)]
pub struct MemoryStore<K, V> {
    values: BTreeMap<K, V>,
}

impl<K, V> MemoryStore<K, V> {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<K, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ValueStore<K, V> for MemoryStore<K, V>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn contains(&self, key: &K) -> bool {
        self.values.contains_key(key)
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn keys(&self) -> Vec<K> {
        self.values.keys().cloned().collect()
    }

    fn read(&self, key: &K) -> Result<Option<V>, BackendError> {
        Ok(self.values.get(key).cloned())
    }

    fn write(&mut self, key: K, value: V) -> Result<(), BackendError> {
        self.values.insert(key, value);
        Ok(())
    }

    fn write_evicting(&mut self, key: K, value: V, victim: &K) -> Result<(), BackendError> {
        self.values.remove(victim);
        self.values.insert(key, value);
        Ok(())
    }

    fn take(&mut self, key: &K) -> Result<Option<V>, BackendError> {
        Ok(self.values.remove(key))
    }

    fn discard(&mut self, key: &K) -> Result<bool, BackendError> {
        Ok(self.values.remove(key).is_some())
    }

    fn clear(&mut self) -> Result<(), BackendError> {
        self.values.clear();
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

// == Blob Store ==
/// Values written through a storage backend, addressed by locator.
pub struct BlobStore<K, V> {
    locators: BTreeMap<K, Locator>,
    backend: Box<dyn StorageBackend<V>>,
}

impl<K, V> BlobStore<K, V> {
    pub fn new(backend: Box<dyn StorageBackend<V>>) -> Self {
        Self {
            locators: BTreeMap::new(),
            backend,
        }
    }
}

impl<K: Debug, V> BlobStore<K, V> {
    /// Deletes `old`; if that fails, deletes the freshly written `fresh` blob
    /// instead so the locator map can stay as it was.
    fn release_or_abandon(&mut self, old: &Locator, fresh: &Locator, key: &K) -> Result<(), BackendError> {
        if let Err(e) = self.backend.delete(old) {
            if let Err(undo) = self.backend.delete(fresh) {
                error!("Failed to drop orphaned blob {} for key {:?}: {}", fresh, key, undo);
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Deletes a blob, treating one that is already gone as deleted.
fn release<V>(backend: &mut dyn StorageBackend<V>, locator: &Locator) -> Result<(), BackendError> {
    match backend.delete(locator) {
        Ok(()) | Err(BackendError::MissingBlob(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

impl<K: Debug, V> Debug for BlobStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore")
            .field("locators", &self.locators)
            .finish_non_exhaustive()
    }
}

impl<K, V> ValueStore<K, V> for BlobStore<K, V>
where
    K: Ord + Clone + Debug + Send + Sync,
    V: Send + Sync,
{
    fn contains(&self, key: &K) -> bool {
        self.locators.contains_key(key)
    }

    fn len(&self) -> usize {
        self.locators.len()
    }

    fn keys(&self) -> Vec<K> {
        self.locators.keys().cloned().collect()
    }

    fn read(&self, key: &K) -> Result<Option<V>, BackendError> {
        match self.locators.get(key) {
            Some(locator) => self.backend.load(locator).map(Some),
            None => Ok(None),
        }
    }

    fn write(&mut self, key: K, value: V) -> Result<(), BackendError> {
        let locator = self.backend.store(&value)?;

        // Replace the old blob only once the new one is safely written.
        if let Some(old) = self.locators.get(&key).cloned() {
            self.release_or_abandon(&old, &locator, &key)?;
        }

        self.locators.insert(key, locator);
        Ok(())
    }

    fn write_evicting(&mut self, key: K, value: V, victim: &K) -> Result<(), BackendError> {
        let Some(victim_locator) = self.locators.get(victim).cloned() else {
            return self.write(key, value);
        };

        let locator = self.backend.store(&value)?;
        self.release_or_abandon(&victim_locator, &locator, &key)?;

        self.locators.remove(victim);
        self.locators.insert(key, locator);
        Ok(())
    }

    fn take(&mut self, key: &K) -> Result<Option<V>, BackendError> {
        let Some(locator) = self.locators.get(key) else {
            return Ok(None);
        };
        let value = match self.backend.load(locator) {
            Ok(value) => Some(value),
            Err(BackendError::MissingBlob(_)) => None,
            Err(e) => return Err(e),
        };
        release(self.backend.as_mut(), locator)?;
        self.locators.remove(key);
        Ok(value)
    }

    fn discard(&mut self, key: &K) -> Result<bool, BackendError> {
        let Some(locator) = self.locators.get(key) else {
            return Ok(false);
        };
        release(self.backend.as_mut(), locator)?;
        self.locators.remove(key);
        Ok(true)
    }

    fn clear(&mut self) -> Result<(), BackendError> {
        let mut first_error = None;
        let keys: Vec<K> = self.locators.keys().cloned().collect();

        // A key leaves the map only once its blob is gone.
        for key in keys {
            let Some(locator) = self.locators.get(&key) else {
                continue;
            };
            match release(self.backend.as_mut(), locator) {
                Ok(()) => {
                    self.locators.remove(&key);
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => self.backend.clear(),
        }
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

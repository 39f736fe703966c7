//! In-memory backend
//!
//! Serializes values into a byte map. Exercises the persistent tier's code
//! path without touching the filesystem.

use std::collections::HashMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{BackendError, Locator, StorageBackend};

// == Memory Backend ==
#[derive(Debug)]
pub struct MemoryBackend<V> {
    blobs: HashMap<Locator, Vec<u8>>,
    next_id: u64,
    _value: PhantomData<fn() -> V>,
}

impl<V> MemoryBackend<V> {
    pub fn new() -> Self {
        Self {
            blobs: HashMap::new(),
            next_id: 0,
            _value: PhantomData,
        }
    }

    /// Number of stored blobs.
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }
}

impl<V> Default for MemoryBackend<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> StorageBackend<V> for MemoryBackend<V>
where
    V: Serialize + DeserializeOwned,
{
    fn store(&mut self, value: &V) -> Result<Locator, BackendError> {
        let bytes = serde_json::to_vec(value)?;
        let locator = Locator::new(format!("mem-{}", self.next_id));
        self.next_id += 1;
        self.blobs.insert(locator.clone(), bytes);
        Ok(locator)
    }

    fn load(&self, locator: &Locator) -> Result<V, BackendError> {
        let bytes = self
            .blobs
            .get(locator)
            .ok_or_else(|| BackendError::MissingBlob(locator.clone()))?;
        Ok(serde_json::from_slice(bytes)?)
    }

    fn delete(&mut self, locator: &Locator) -> Result<(), BackendError> {
        self.blobs
            .remove(locator)
            .map(|_| ())
            .ok_or_else(|| BackendError::MissingBlob(locator.clone()))
    }

    fn clear(&mut self) -> Result<(), BackendError> {
        self.blobs.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_lifecycle() {
        let mut backend = MemoryBackend::<Vec<u8>>::new();

        let locator = backend.store(&vec![1, 2, 3]).unwrap();
        assert_eq!(backend.load(&locator).unwrap(), vec![1, 2, 3]);

        backend.delete(&locator).unwrap();
        assert_eq!(backend.blob_count(), 0);
        assert!(matches!(backend.load(&locator), Err(BackendError::MissingBlob(_))));
    }
}

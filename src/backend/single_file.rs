//! Aggregate file backend
//!
//! Keeps every value in one JSON document on disk. The whole document is
//! rewritten on each mutation and re-read on each load.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::{BackendError, Locator, StorageBackend};

// == Single File Backend ==
/// Stores all values in one aggregate file.
#[derive(Debug)]
pub struct SingleFileBackend<V> {
    /// Path of the aggregate file
    path: PathBuf,
    /// Mirror of the document last written to disk
    blobs: BTreeMap<String, JsonValue>,
    /// Next locator sequence number
    next_id: u64,
    _value: PhantomData<fn() -> V>,
}

impl<V> SingleFileBackend<V> {
    // == Constructor ==
    /// Creates the backend and writes an empty document to `path`.
    ///
    /// Any existing file at `path` is replaced.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BackendError::io(parent, e))?;
        }
        let backend = Self {
            path,
            blobs: BTreeMap::new(),
            next_id: 0,
            _value: PhantomData,
        };
        backend.persist(&backend.blobs)?;
        Ok(backend)
    }

    /// Path of the aggregate file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of values in the document.
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    // == Persist ==
    /// Writes `document` through a sibling temp file and renames it into place.
    fn persist(&self, document: &BTreeMap<String, JsonValue>) -> Result<(), BackendError> {
        let bytes = serde_json::to_vec(document)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| BackendError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| BackendError::io(&self.path, e))
    }

    fn read_document(&self) -> Result<BTreeMap<String, JsonValue>, BackendError> {
        let bytes = fs::read(&self.path).map_err(|e| BackendError::io(&self.path, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl<V> StorageBackend<V> for SingleFileBackend<V>
where
    V: Serialize + DeserializeOwned,
{
    fn store(&mut self, value: &V) -> Result<Locator, BackendError> {
        let encoded = serde_json::to_value(value)?;
        let locator = Locator::new(format!("blob-{}", self.next_id));

        let mut document = self.blobs.clone();
        document.insert(locator.as_str().to_string(), encoded);
        self.persist(&document)?;

        self.blobs = document;
        self.next_id += 1;
        Ok(locator)
    }

    fn load(&self, locator: &Locator) -> Result<V, BackendError> {
        let mut document = self.read_document()?;
        let encoded = document
            .remove(locator.as_str())
            .ok_or_else(|| BackendError::MissingBlob(locator.clone()))?;
        Ok(serde_json::from_value(encoded)?)
    }

    fn delete(&mut self, locator: &Locator) -> Result<(), BackendError> {
        if !self.blobs.contains_key(locator.as_str()) {
            return Err(BackendError::MissingBlob(locator.clone()));
        }

        let mut document = self.blobs.clone();
        document.remove(locator.as_str());
        self.persist(&document)?;

        self.blobs = document;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), BackendError> {
        let empty = BTreeMap::new();
        self.persist(&empty)?;
        self.blobs = empty;
        Ok(())
    }
}

impl<V> Drop for SingleFileBackend<V> {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("Failed to remove cache file {}: {}", self.path.display(), e);
            }
        }
    }
}

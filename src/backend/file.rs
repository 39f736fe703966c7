//! Per-value file backend
//!
//! Stores every value as its own JSON file named by a random UUID.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::{BackendError, Locator, StorageBackend};

// == File Backend ==
/// Writes one file per value inside a dedicated directory.
#[derive(Debug)]
pub struct FileBackend {
    /// Directory holding the blobs
    dir: PathBuf,
    /// Blobs written by this backend and not yet deleted
    blobs: HashSet<Locator>,
    /// Whether `dir` was created by this backend and goes away with it
    owns_dir: bool,
}

impl FileBackend {
    // == Constructor ==
    /// Creates the backend, creating `dir` if it does not exist.
    ///
    /// A directory created here is removed again when the backend is dropped;
    /// an existing one is left in place.
    ///
    /// # Arguments
    /// * `dir` - Directory the blobs are written to
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let dir = dir.into();
        let owns_dir = !dir.exists();
        fs::create_dir_all(&dir).map_err(|e| BackendError::io(&dir, e))?;
        Ok(Self {
            dir,
            blobs: HashSet::new(),
            owns_dir,
        })
    }

    /// Directory the blobs are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of blobs currently on disk.
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    fn path_of(&self, locator: &Locator) -> PathBuf {
        self.dir.join(locator.as_str())
    }

    fn remove_blob(&self, locator: &Locator) -> Result<(), BackendError> {
        let path = self.path_of(locator);
        fs::remove_file(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackendError::MissingBlob(locator.clone()),
            _ => BackendError::io(path, e),
        })
    }
}

impl<V> StorageBackend<V> for FileBackend
where
    V: Serialize + DeserializeOwned,
{
    fn store(&mut self, value: &V) -> Result<Locator, BackendError> {
        let bytes = serde_json::to_vec(value)?;
        let locator = Locator::new(format!("{}.json", Uuid::new_v4()));
        let path = self.path_of(&locator);
        fs::write(&path, bytes).map_err(|e| BackendError::io(path, e))?;
        self.blobs.insert(locator.clone());
        Ok(locator)
    }

    fn load(&self, locator: &Locator) -> Result<V, BackendError> {
        let path = self.path_of(locator);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackendError::MissingBlob(locator.clone()),
            _ => BackendError::io(path, e),
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn delete(&mut self, locator: &Locator) -> Result<(), BackendError> {
        let result = self.remove_blob(locator);
        if matches!(result, Ok(()) | Err(BackendError::MissingBlob(_))) {
            self.blobs.remove(locator);
        }
        result
    }

    fn clear(&mut self) -> Result<(), BackendError> {
        let mut first_error = None;
        let locators: Vec<Locator> = self.blobs.iter().cloned().collect();

        for locator in locators {
            match self.remove_blob(&locator) {
                Ok(()) | Err(BackendError::MissingBlob(_)) => {
                    self.blobs.remove(&locator);
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        for locator in self.blobs.drain().collect::<Vec<_>>() {
            let path = self.dir.join(locator.as_str());
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove blob {} on drop: {}", path.display(), e);
            }
        }

        if self.owns_dir {
            if let Err(e) = fs::remove_dir(&self.dir) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove blob directory {}: {}", self.dir.display(), e);
                }
            }
        }
    }
}

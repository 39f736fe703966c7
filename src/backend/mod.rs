//! Storage Backend Module
//!
//! Durable byte stores that a persistent cache tier writes its values through.
//! A backend hands out an opaque [`Locator`] per stored value; the tier keeps
//! the key → locator mapping and never looks inside it.

mod file;
mod memory;
mod single_file;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use single_file::SingleFileBackend;

// == Locator ==
/// Opaque address of a stored value inside one backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Locator(String);

impl Locator {
    /// Creates a locator from its textual form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the textual form of the locator.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Backend Error ==
/// Failure reported by a storage backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Filesystem operation failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No value is stored under the locator
    #[error("No blob stored at {0}")]
    MissingBlob(Locator),
}

impl BackendError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackendError::Io {
            path: path.into(),
            source,
        }
    }
}

// == Storage Backend Trait ==
/// Key-agnostic durable store used by persistent cache tiers.
///
/// Each backend instance belongs to exactly one tier.
pub trait StorageBackend<V>: Send + Sync {
    /// Stores a value and returns where it lives.
    fn store(&mut self, value: &V) -> Result<Locator, BackendError>;

    /// Reads back a previously stored value.
    fn load(&self, locator: &Locator) -> Result<V, BackendError>;

    /// Deletes a stored value.
    fn delete(&mut self, locator: &Locator) -> Result<(), BackendError>;

    /// Releases every value this backend has stored.
    fn clear(&mut self) -> Result<(), BackendError>;
}

// == Backend Layout ==
/// On-disk layout selected through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendLayout {
    /// One file per stored value
    #[default]
    PerValue,
    /// All values in one aggregate file
    SingleFile,
}

impl std::str::FromStr for BackendLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-value" | "per_value" | "files" => Ok(BackendLayout::PerValue),
            "single-file" | "single_file" | "file" => Ok(BackendLayout::SingleFile),
            other => Err(format!("unknown backend layout '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display() {
        let locator = Locator::new("abc.json");
        assert_eq!(locator.to_string(), "abc.json");
        assert_eq!(locator.as_str(), "abc.json");
    }

    #[test]
    fn test_backend_layout_parse() {
        assert_eq!("per-value".parse(), Ok(BackendLayout::PerValue));
        assert_eq!("Single-File".parse(), Ok(BackendLayout::SingleFile));
        assert!("tape".parse::<BackendLayout>().is_err());
    }
}

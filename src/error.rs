//! Error types for the tiered cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

use crate::backend::BackendError;

// == Cache Error Enum ==
/// Unified error type for the tiered cache.
///
/// Absent keys are never reported through this type: lookups return `Option`
/// and deletes return `bool`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The persistent tier's backend failed while handling a key
    #[error("Backend failure for key {key}: {source}")]
    Backend {
        key: String,
        #[source]
        source: BackendError,
    },

    /// Eviction or promotion was requested on an empty tier
    #[error("Score index is empty")]
    EmptyIndex,

    /// A cross-tier transfer targeted a tier with no free slot
    #[error("Tier capacity of {capacity} exceeded")]
    CapacityExceeded { capacity: usize },

    /// Construction parameters were rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    // == Backend Helper ==
    /// Wraps a backend failure with the key it happened on.
    pub fn backend<K: std::fmt::Debug>(key: &K, source: BackendError) -> Self {
        CacheError::Backend {
            key: format!("{:?}", key),
            source,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the tiered cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Locator;

    #[test]
    fn test_backend_error_carries_key() {
        let err = CacheError::backend(&"user:42", BackendError::MissingBlob(Locator::new("a.json")));
        let message = err.to_string();
        assert!(message.contains("\"user:42\""));
        assert!(message.contains("a.json"));
    }

    #[test]
    fn test_capacity_exceeded_message() {
        let err = CacheError::CapacityExceeded { capacity: 4 };
        assert_eq!(err.to_string(), "Tier capacity of 4 exceeded");
    }
}

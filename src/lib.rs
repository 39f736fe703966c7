//! Tiered Cache - A two-level key-value cache
//!
//! A small in-memory tier in front of a larger file-backed tier, with LFU,
//! LRU or MRU eviction and periodic rebalancing of hot entries into the fast
//! tier.

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;

pub use backend::{BackendLayout, FileBackend, MemoryBackend, SingleFileBackend, StorageBackend};
pub use cache::{Cache, CacheStats, CacheTier, CacheUsage, EvictionStrategy, SharedCache, TwoLevelCache};
pub use config::Config;
pub use error::{CacheError, Result};

//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::backend::BackendLayout;
use crate::cache::{EvictionStrategy, REBALANCE_PERIOD};
use crate::error::{CacheError, Result};

/// Tiered cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of entries in the in-memory tier
    pub fast_tier_capacity: usize,
    /// Maximum number of entries in the on-disk tier
    pub slow_tier_capacity: usize,
    /// Eviction strategy shared by both tiers
    pub strategy: EvictionStrategy,
    /// Lookups between rebalance passes
    pub rebalance_period: usize,
    /// Directory the slow tier writes its blobs under
    pub cache_dir: PathBuf,
    /// One file per value, or one aggregate file
    pub backend_layout: BackendLayout,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `FAST_TIER_CAPACITY` - Fast tier entries (default: 100)
    /// - `SLOW_TIER_CAPACITY` - Slow tier entries (default: 1000)
    /// - `EVICTION_STRATEGY` - `lfu`, `lru` or `mru` (default: lfu)
    /// - `REBALANCE_PERIOD` - Lookups between rebalance passes (default: 20)
    /// - `CACHE_DIR` - Slow tier directory (default: `<temp dir>/tiered_cache`)
    /// - `BACKEND_LAYOUT` - `per-value` or `single-file` (default: per-value)
    ///
    /// Unset or unparsable variables fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fast_tier_capacity: parse_var("FAST_TIER_CAPACITY")
                .unwrap_or(defaults.fast_tier_capacity),
            slow_tier_capacity: parse_var("SLOW_TIER_CAPACITY")
                .unwrap_or(defaults.slow_tier_capacity),
            strategy: parse_var("EVICTION_STRATEGY").unwrap_or(defaults.strategy),
            rebalance_period: parse_var("REBALANCE_PERIOD").unwrap_or(defaults.rebalance_period),
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            backend_layout: parse_var("BACKEND_LAYOUT").unwrap_or(defaults.backend_layout),
        }
    }

    // == Validation ==
    /// Rejects zero capacities and a zero rebalance period.
    pub fn validate(&self) -> Result<()> {
        if self.fast_tier_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "FAST_TIER_CAPACITY must be at least 1".to_string(),
            ));
        }
        if self.slow_tier_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "SLOW_TIER_CAPACITY must be at least 1".to_string(),
            ));
        }
        if self.rebalance_period == 0 {
            return Err(CacheError::InvalidConfig(
                "REBALANCE_PERIOD must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fast_tier_capacity: 100,
            slow_tier_capacity: 1000,
            strategy: EvictionStrategy::LeastFrequentlyUsed,
            rebalance_period: REBALANCE_PERIOD,
            cache_dir: env::temp_dir().join("tiered_cache"),
            backend_layout: BackendLayout::PerValue,
        }
    }
}

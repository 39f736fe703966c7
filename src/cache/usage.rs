//! Per-tier score snapshot of a two-level cache.

use std::fmt;

use serde::Serialize;

use crate::cache::score_index::Score;
use crate::cache::strategy::EvictionStrategy;

// == Cache Usage ==
/// Keys and scores held by each tier at one point in time, in key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheUsage<K> {
    pub strategy: EvictionStrategy,
    pub fast_tier: Vec<(K, Score)>,
    pub slow_tier: Vec<(K, Score)>,
}

impl<K: fmt::Debug> fmt::Display for CacheUsage<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fast tier usage: ")?;
        write_scores(f, &self.fast_tier)?;
        write!(f, "; slow tier usage: ")?;
        write_scores(f, &self.slow_tier)
    }
}

fn write_scores<K: fmt::Debug>(f: &mut fmt::Formatter<'_>, entries: &[(K, Score)]) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (key, score)) in entries.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{:?}={}", key, score)?;
    }
    write!(f, "}}")
}

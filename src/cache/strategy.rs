//! Eviction Strategy Module
//!
//! Defines how scores are produced and refreshed, and which key a tier gives
//! up first or lifts to a faster tier.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::cache::clock::monotonic_now;
use crate::cache::score_index::{Score, ScoreIndex};
use crate::error::Result;

// == Eviction Strategy ==
/// Replacement policy shared by both tiers of a cache.
///
/// The strategy holds no state: each call works on the score index it is
/// handed, so every tier keeps its own bookkeeping.
///
/// | Variant | initial | refresh | evicts | promotes |
/// |---|---|---|---|---|
/// | `LeastFrequentlyUsed` | 1 | old + 1 | min | max |
/// | `LeastRecentlyUsed` | now | now | min | max |
/// | `MostRecentlyUsed` | now | now | max | min |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionStrategy {
    /// Scores count accesses
    #[default]
    LeastFrequentlyUsed,
    /// Scores are touch timestamps, the oldest touch goes first
    LeastRecentlyUsed,
    /// Scores are touch timestamps, the newest touch goes first
    MostRecentlyUsed,
}

impl EvictionStrategy {
    /// All variants, in declaration order.
    pub const ALL: [EvictionStrategy; 3] = [
        EvictionStrategy::LeastFrequentlyUsed,
        EvictionStrategy::LeastRecentlyUsed,
        EvictionStrategy::MostRecentlyUsed,
    ];

    // == Initial Score ==
    /// Score assigned to a freshly inserted key.
    pub fn initial_score(&self) -> Score {
        match self {
            EvictionStrategy::LeastFrequentlyUsed => 1,
            EvictionStrategy::LeastRecentlyUsed | EvictionStrategy::MostRecentlyUsed => {
                monotonic_now()
            }
        }
    }

    // == Refresh Score ==
    /// Score assigned when a present key is read.
    pub fn refresh_score(&self, old: Score) -> Score {
        match self {
            EvictionStrategy::LeastFrequentlyUsed => old.saturating_add(1),
            EvictionStrategy::LeastRecentlyUsed | EvictionStrategy::MostRecentlyUsed => {
                monotonic_now()
            }
        }
    }

    // == Eviction Candidate ==
    /// Key that should leave the tier first.
    ///
    /// Fails with `EmptyIndex` when `scores` is empty.
    pub fn eviction_candidate<'a, K: Ord + Clone>(&self, scores: &'a ScoreIndex<K>) -> Result<&'a K> {
        match self {
            EvictionStrategy::LeastFrequentlyUsed | EvictionStrategy::LeastRecentlyUsed => {
                scores.min_key()
            }
            EvictionStrategy::MostRecentlyUsed => scores.max_key(),
        }
    }

    // == Promotion Candidate ==
    /// Key in a slow tier that most deserves a fast-tier slot.
    ///
    /// Fails with `EmptyIndex` when `scores` is empty.
    pub fn promotion_candidate<'a, K: Ord + Clone>(
        &self,
        scores: &'a ScoreIndex<K>,
    ) -> Result<&'a K> {
        match self {
            EvictionStrategy::LeastFrequentlyUsed | EvictionStrategy::LeastRecentlyUsed => {
                scores.max_key()
            }
            EvictionStrategy::MostRecentlyUsed => scores.min_key(),
        }
    }

    /// Short name used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionStrategy::LeastFrequentlyUsed => "lfu",
            EvictionStrategy::LeastRecentlyUsed => "lru",
            EvictionStrategy::MostRecentlyUsed => "mru",
        }
    }
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lfu" | "least-frequently-used" => Ok(EvictionStrategy::LeastFrequentlyUsed),
            "lru" | "least-recently-used" => Ok(EvictionStrategy::LeastRecentlyUsed),
            "mru" | "most-recently-used" => Ok(EvictionStrategy::MostRecentlyUsed),
            other => Err(format!("unknown eviction strategy '{}'", other)),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    fn index_of(entries: &[(u32, Score)]) -> ScoreIndex<u32> {
        let mut index = ScoreIndex::new();
        for (key, score) in entries {
            index.insert_or_update(*key, *score);
        }
        index
    }

    #[test]
    fn test_lfu_scores() {
        let lfu = EvictionStrategy::LeastFrequentlyUsed;
        assert_eq!(lfu.initial_score(), 1);
        assert_eq!(lfu.refresh_score(1), 2);
        assert_eq!(lfu.refresh_score(41), 42);
        assert_eq!(lfu.refresh_score(Score::MAX), Score::MAX);
    }

    #[test]
    fn test_recency_scores_increase() {
        for strategy in [
            EvictionStrategy::LeastRecentlyUsed,
            EvictionStrategy::MostRecentlyUsed,
        ] {
            let first = strategy.initial_score();
            let second = strategy.refresh_score(first);
            assert!(second > first);
        }
    }

    #[test]
    fn test_candidates_per_variant() {
        let index = index_of(&[(1, 30), (2, 10), (3, 20)]);

        let lfu = EvictionStrategy::LeastFrequentlyUsed;
        assert_eq!(lfu.eviction_candidate(&index).unwrap(), &2);
        assert_eq!(lfu.promotion_candidate(&index).unwrap(), &1);

        let lru = EvictionStrategy::LeastRecentlyUsed;
        assert_eq!(lru.eviction_candidate(&index).unwrap(), &2);
        assert_eq!(lru.promotion_candidate(&index).unwrap(), &1);

        let mru = EvictionStrategy::MostRecentlyUsed;
        assert_eq!(mru.eviction_candidate(&index).unwrap(), &1);
        assert_eq!(mru.promotion_candidate(&index).unwrap(), &2);
    }

    #[test]
    fn test_candidates_on_empty_index() {
        let index: ScoreIndex<u32> = ScoreIndex::new();
        for strategy in EvictionStrategy::ALL {
            assert!(matches!(strategy.eviction_candidate(&index), Err(CacheError::EmptyIndex)));
            assert!(matches!(strategy.promotion_candidate(&index), Err(CacheError::EmptyIndex)));
        }
    }

    #[test]
    fn test_ties_are_deterministic() {
        let index = index_of(&[(3, 5), (1, 5), (2, 5)]);
        let lfu = EvictionStrategy::LeastFrequentlyUsed;

        for _ in 0..10 {
            assert_eq!(lfu.eviction_candidate(&index).unwrap(), &1);
            assert_eq!(lfu.promotion_candidate(&index).unwrap(), &3);
        }
    }

    #[test]
    fn test_parse_and_display() {
        for strategy in EvictionStrategy::ALL {
            assert_eq!(strategy.to_string().parse::<EvictionStrategy>(), Ok(strategy));
        }
        assert_eq!(
            "Least-Recently-Used".parse::<EvictionStrategy>(),
            Ok(EvictionStrategy::LeastRecentlyUsed)
        );
        assert!("fifo".parse::<EvictionStrategy>().is_err());
    }
}

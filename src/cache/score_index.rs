//! Score Index Module
//!
//! Ordered index over (key, score) pairs used to pick eviction and promotion
//! candidates.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CacheError, Result};

/// Usage counter or timestamp, depending on the strategy.
pub type Score = u64;

// == Score Index ==
/// Tracks one score per key and answers min/max-by-score queries.
///
/// Entries are keyed by the actual key; the score only orders them. Keys that
/// share a score are kept as distinct entries and ordered among themselves by
/// key, so `min_key` returns the smallest key of the lowest score and
/// `max_key` the largest key of the highest score.
#[derive(Debug, Clone, Default)]
pub struct ScoreIndex<K> {
    /// Current score per key
    scores: BTreeMap<K, Score>,
    /// Same entries sorted by (score, key)
    ordered: BTreeSet<(Score, K)>,
}

impl<K: Ord + Clone> ScoreIndex<K> {
    // == Constructor ==
    /// Creates a new empty index.
    pub fn new() -> Self {
        Self {
            scores: BTreeMap::new(),
            ordered: BTreeSet::new(),
        }
    }

    // == Insert Or Update ==
    /// Sets the score for `key`, returning the previous one if any.
    pub fn insert_or_update(&mut self, key: K, score: Score) -> Option<Score> {
        let previous = self.scores.insert(key.clone(), score);
        if let Some(old) = previous {
            self.ordered.remove(&(old, key.clone()));
        }
        self.ordered.insert((score, key));
        previous
    }

    // == Remove ==
    /// Removes `key` and returns its score.
    pub fn remove(&mut self, key: &K) -> Option<Score> {
        let score = self.scores.remove(key)?;
        self.ordered.remove(&(score, key.clone()));
        Some(score)
    }

    /// Returns the score of `key`.
    pub fn get(&self, key: &K) -> Option<Score> {
        self.scores.get(key).copied()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.scores.contains_key(key)
    }

    // == Min / Max ==
    /// Key with the lowest score.
    pub fn min_key(&self) -> Result<&K> {
        self.ordered
            .first()
            .map(|(_, key)| key)
            .ok_or(CacheError::EmptyIndex)
    }

    /// Key with the highest score.
    pub fn max_key(&self) -> Result<&K> {
        self.ordered
            .last()
            .map(|(_, key)| key)
            .ok_or(CacheError::EmptyIndex)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, Score)> {
        self.scores.iter().map(|(key, score)| (key, *score))
    }

    pub fn clear(&mut self) {
        self.scores.clear();
        self.ordered.clear();
    }
}

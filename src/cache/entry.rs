//! Cache Entry Module
//!
//! An entry lifted out of one tier on its way into another.

use crate::cache::score_index::Score;

// == Entry ==
/// A key, its value and the score it carried in its source tier.
///
/// Moving the score along with the value keeps usage history intact across
/// promotion and demotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<K, V> {
    pub key: K,
    pub value: V,
    pub score: Score,
}

impl<K, V> Entry<K, V> {
    pub fn new(key: K, value: V, score: Score) -> Self {
        Self { key, value, score }
    }
}

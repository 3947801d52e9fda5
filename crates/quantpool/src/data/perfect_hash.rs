//! Stable dense codes for categorical features.
//!
//! Codes are handed out in first-seen order starting at 0 and are never
//! reassigned. Sharing one [`PerfectHashIndexer`] between a learn builder and
//! a test builder therefore gives both pools the same codes.
//!
//! The feature map only locates a table. Each table sits behind its own
//! mutex, so binarizing a large column blocks other writers of that feature
//! and nothing else.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHasher;

/// Raw key of a category given as a string.
///
/// The hash is deterministic across runs on the same target. `FxHasher`
/// mixes in machine words, so 32-bit and 64-bit builds disagree.
pub fn category_key(value: &str) -> u32 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    let hash = hasher.finish();
    (hash ^ (hash >> 32)) as u32
}

/// Raw key of a category given as a number; `-0.0` and `0.0` share a key.
#[inline]
pub fn numeric_category_key(value: f32) -> u32 {
    if value == 0.0 {
        0.0f32.to_bits()
    } else {
        value.to_bits()
    }
}

#[derive(Debug, Default)]
struct CategoryTable {
    codes: HashMap<u32, u32>,
}

impl CategoryTable {
    #[inline]
    fn code_or_insert(&mut self, key: u32) -> u32 {
        let next = self.codes.len() as u32;
        *self.codes.entry(key).or_insert(next)
    }
}

/// Per-feature injective mapping from raw category keys to dense codes.
///
/// Each feature has its own table; tables of different features can be
/// updated concurrently.
#[derive(Debug, Default)]
pub struct PerfectHashIndexer {
    tables: DashMap<usize, Arc<Mutex<CategoryTable>>>,
}

impl PerfectHashIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, feature: usize) -> Arc<Mutex<CategoryTable>> {
        Arc::clone(self.tables.entry(feature).or_default().value())
    }

    fn existing_table(&self, feature: usize) -> Option<Arc<Mutex<CategoryTable>>> {
        self.tables.get(&feature).map(|table| Arc::clone(table.value()))
    }

    /// Look up or assign a code for every key.
    ///
    /// New keys receive the current distinct count as their code.
    pub fn update_and_binarize(&self, feature: usize, raw: &[u32]) -> Vec<u32> {
        let table = self.table(feature);
        let mut table = table.lock();
        raw.iter().map(|&key| table.code_or_insert(key)).collect()
    }

    /// Binarize without assigning codes.
    ///
    /// Unknown keys map to the sentinel `unique_value_count(feature)`.
    pub fn binarize_known(&self, feature: usize, raw: &[u32]) -> Vec<u32> {
        match self.existing_table(feature) {
            Some(table) => {
                let table = table.lock();
                let unknown = table.codes.len() as u32;
                raw.iter()
                    .map(|key| table.codes.get(key).copied().unwrap_or(unknown))
                    .collect()
            }
            None => vec![0; raw.len()],
        }
    }

    /// Code assigned to `key`, if any.
    pub fn code_of(&self, feature: usize, key: u32) -> Option<u32> {
        let table = self.existing_table(feature)?;
        let table = table.lock();
        table.codes.get(&key).copied()
    }

    /// Number of distinct codes assigned for `feature`.
    pub fn unique_value_count(&self, feature: usize) -> u32 {
        self.existing_table(feature).map_or(0, |table| {
            let table = table.lock();
            table.codes.len() as u32
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_in_first_seen_order() {
        let indexer = PerfectHashIndexer::new();
        let codes = indexer.update_and_binarize(0, &[70, 10, 70, 30]);
        assert_eq!(codes, vec![0, 1, 0, 2]);
        assert_eq!(indexer.unique_value_count(0), 3);
    }

    #[test]
    fn test_codes_stable_across_calls() {
        let indexer = PerfectHashIndexer::new();
        let a = category_key("a");
        let b = category_key("b");
        let c = category_key("c");

        assert_eq!(indexer.update_and_binarize(3, &[a, b]), vec![0, 1]);
        assert_eq!(indexer.update_and_binarize(3, &[b, c]), vec![1, 2]);
        assert_eq!(indexer.code_of(3, a), Some(0));
        assert_eq!(indexer.code_of(3, c), Some(2));
    }

    #[test]
    fn test_features_are_independent() {
        let indexer = PerfectHashIndexer::new();
        indexer.update_and_binarize(0, &[1, 2]);
        assert_eq!(indexer.update_and_binarize(1, &[2]), vec![0]);
        assert_eq!(indexer.unique_value_count(0), 2);
        assert_eq!(indexer.unique_value_count(1), 1);
        assert_eq!(indexer.unique_value_count(2), 0);
    }

    #[test]
    fn test_binarize_known_never_assigns() {
        let indexer = PerfectHashIndexer::new();
        indexer.update_and_binarize(0, &[5, 6]);

        assert_eq!(indexer.binarize_known(0, &[6, 9, 5]), vec![1, 2, 0]);
        assert_eq!(indexer.unique_value_count(0), 2);
        assert_eq!(indexer.code_of(0, 9), None);
    }

    #[test]
    fn test_locked_feature_does_not_block_others() {
        let indexer = PerfectHashIndexer::new();
        indexer.update_and_binarize(0, &[1]);
        let table = indexer.table(0);
        let _guard = table.lock();

        // Features sharing a map shard with feature 0 stay writable.
        for feature in 1..64 {
            assert_eq!(indexer.update_and_binarize(feature, &[7, 8, 7]), vec![0, 1, 0]);
            assert_eq!(indexer.unique_value_count(feature), 2);
        }
    }

    #[test]
    fn test_concurrent_updates_stay_dense() {
        use rayon::prelude::*;

        let indexer = PerfectHashIndexer::new();
        let chunks: Vec<Vec<u32>> = (0..16u32).map(|c| (0..200).map(|k| (k * 7 + c) % 500).collect()).collect();
        let results: Vec<(Vec<u32>, Vec<u32>)> = chunks
            .par_iter()
            .map(|chunk| (chunk.clone(), indexer.update_and_binarize(2, chunk)))
            .collect();

        let count = indexer.unique_value_count(2);
        let mut seen: HashMap<u32, u32> = HashMap::new();
        for (keys, codes) in &results {
            for (key, &code) in keys.iter().zip(codes) {
                assert!(code < count);
                assert_eq!(*seen.entry(*key).or_insert(code), code);
            }
        }
        assert_eq!(seen.len() as u32, count);
        let mut codes: Vec<u32> = seen.into_values().collect();
        codes.sort_unstable();
        assert_eq!(codes, (0..count).collect::<Vec<_>>());
    }

    #[test]
    fn test_category_key_is_deterministic() {
        assert_eq!(category_key("red"), category_key("red"));
        assert_ne!(category_key("red"), category_key("blue"));
        assert_eq!(numeric_category_key(-0.0), numeric_category_key(0.0));
        assert_ne!(numeric_category_key(1.0), numeric_category_key(2.0));
    }
}

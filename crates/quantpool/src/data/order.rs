//! Document ordering.
//!
//! A [`DocumentOrder`] is a permutation of `[0, n_docs)`: position `i` of the
//! compiled pool holds the document that was ingested at `order[i]`. The same
//! permutation is applied to every per-document array and every feature
//! column, so they stay aligned.
//!
//! # Precedence
//!
//! 1. Any non-zero timestamp: stable sort by timestamp, shuffling is disabled.
//! 2. Shuffle with groups: group order is randomized, each group stays
//!    contiguous with its rows in ingestion order.
//! 3. Shuffle without groups: uniform random permutation.
//! 4. Otherwise: identity.
//!
//! Indices are `u32`, so an order holds at most [`MAX_DOCUMENTS`] documents.

use std::ops::Range;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rustc_hash::{FxHashMap, FxHashSet};

use super::types::GroupId;
use crate::error::PoolError;

/// Largest document count a [`DocumentOrder`] can index.
pub const MAX_DOCUMENTS: usize = u32::MAX as usize;

/// What produced a [`DocumentOrder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderSource {
    Identity,
    Timestamp,
    Shuffle,
    GroupShuffle,
}

/// A permutation of document indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentOrder {
    indices: Vec<u32>,
    source: OrderSource,
}

impl DocumentOrder {
    /// Compute the order for a pool.
    ///
    /// `timestamps` and `group_ids` must both have one entry per document.
    pub fn compute(timestamps: &[u64], group_ids: &[GroupId], shuffle: bool, seed: u64) -> Self {
        debug_assert_eq!(timestamps.len(), group_ids.len());

        if timestamps.iter().any(|&t| t != 0) {
            if shuffle {
                tracing::debug!("timestamps present, shuffling disabled");
            }
            return Self::by_timestamp(timestamps);
        }
        if !shuffle {
            return Self::identity(group_ids.len());
        }
        if has_groups(group_ids) {
            Self::group_shuffled(group_ids, seed)
        } else {
            Self::shuffled(group_ids.len(), seed)
        }
    }

    pub fn identity(n_docs: usize) -> Self {
        debug_assert!(n_docs <= MAX_DOCUMENTS);
        Self {
            indices: (0..n_docs as u32).collect(),
            source: OrderSource::Identity,
        }
    }

    /// Stable sort of documents by ascending timestamp.
    pub fn by_timestamp(timestamps: &[u64]) -> Self {
        debug_assert!(timestamps.len() <= MAX_DOCUMENTS);
        let mut indices: Vec<u32> = (0..timestamps.len() as u32).collect();
        indices.sort_by_key(|&doc| timestamps[doc as usize]);
        Self {
            indices,
            source: OrderSource::Timestamp,
        }
    }

    /// Uniform random permutation, reproducible from `seed`.
    pub fn shuffled(n_docs: usize, seed: u64) -> Self {
        debug_assert!(n_docs <= MAX_DOCUMENTS);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut indices: Vec<u32> = (0..n_docs as u32).collect();
        indices.shuffle(&mut rng);
        Self {
            indices,
            source: OrderSource::Shuffle,
        }
    }

    /// Random permutation of groups; rows inside a group keep their order.
    ///
    /// Members are collected by group id, so a group whose rows are not
    /// adjacent in ingestion order still ends up contiguous.
    pub fn group_shuffled(group_ids: &[GroupId], seed: u64) -> Self {
        debug_assert!(group_ids.len() <= MAX_DOCUMENTS);
        let mut slots: FxHashMap<GroupId, usize> = FxHashMap::default();
        let mut groups: Vec<Vec<u32>> = Vec::new();
        for (row, &group) in group_ids.iter().enumerate() {
            let slot = *slots.entry(group).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(row as u32);
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        groups.shuffle(&mut rng);
        Self {
            indices: groups.concat(),
            source: OrderSource::GroupShuffle,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn source(&self) -> OrderSource {
        self.source
    }

    /// Whether a random shuffle produced this order.
    #[inline]
    pub fn is_shuffled(&self) -> bool {
        matches!(self.source, OrderSource::Shuffle | OrderSource::GroupShuffle)
    }

    /// Whether every document stays in place.
    pub fn is_identity(&self) -> bool {
        self.indices.iter().enumerate().all(|(pos, &doc)| pos == doc as usize)
    }

    /// Whether the indices form a bijection on `[0, len)`.
    pub fn is_permutation(&self) -> bool {
        let mut seen = vec![false; self.indices.len()];
        for &doc in &self.indices {
            match seen.get_mut(doc as usize) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }

    /// Reorder `source` so that `out[i] = source[order[i]]`.
    ///
    /// # Panics
    /// Panics if `source` is shorter than the order.
    pub fn gather<T: Copy>(&self, source: &[T]) -> Vec<T> {
        self.indices.iter().map(|&doc| source[doc as usize]).collect()
    }

    /// Reorder `values` in place.
    pub fn apply<T: Copy>(&self, values: &mut Vec<T>) {
        *values = self.gather(values);
    }

    /// Final position of every ingested document: `inverse()[order[i]] == i`.
    pub fn inverse(&self) -> Vec<u32> {
        let mut positions = vec![0u32; self.indices.len()];
        for (pos, &doc) in self.indices.iter().enumerate() {
            positions[doc as usize] = pos as u32;
        }
        positions
    }
}

/// Whether any document carries a group id other than its own row index.
pub fn has_groups(group_ids: &[GroupId]) -> bool {
    group_ids
        .iter()
        .enumerate()
        .any(|(row, &group)| group != row as GroupId)
}

/// Fail if a group id shows up again after a different group started.
pub fn check_groups_contiguous(group_ids: &[GroupId]) -> Result<(), PoolError> {
    let mut finished: FxHashSet<GroupId> = FxHashSet::default();
    for range in group_ranges(group_ids) {
        let group_id = group_ids[range.start];
        if !finished.insert(group_id) {
            return Err(PoolError::GroupsNotContiguous {
                group_id,
                row: range.start,
            });
        }
    }
    Ok(())
}

/// Contiguous runs of equal group ids, in document order.
pub fn group_ranges(group_ids: &[GroupId]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for row in 1..=group_ids.len() {
        if row == group_ids.len() || group_ids[row] != group_ids[start] {
            ranges.push(start..row);
            start = row;
        }
    }
    ranges
}

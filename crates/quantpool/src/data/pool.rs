//! The assembled, immutable data pool.

use std::collections::BTreeSet;

use ndarray::{Array2, ArrayView2};

use super::column::CompiledColumn;
use super::order::{group_ranges, DocumentOrder};
use super::types::{GroupId, Pair, PoolMetaInfo};
use crate::error::PoolError;

// =============================================================================
// Per-document arrays
// =============================================================================

/// Per-document arrays owned by the builder during ingestion.
#[derive(Clone, Debug, Default)]
pub(crate) struct DocumentColumns {
    pub targets: Vec<f32>,
    pub weights: Vec<f32>,
    pub group_ids: Vec<GroupId>,
    pub subgroup_ids: Vec<u32>,
    pub timestamps: Vec<u64>,
    pub baselines: Vec<Vec<f32>>,
}

impl DocumentColumns {
    pub fn with_baselines(baseline_count: usize) -> Self {
        Self {
            baselines: vec![Vec::new(); baseline_count],
            ..Default::default()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Grow to `n_docs`. Each new row is its own group and subgroup, with
    /// unit weight.
    pub fn resize(&mut self, n_docs: usize) {
        let old = self.len();
        self.targets.resize(n_docs, 0.0);
        self.weights.resize(n_docs, 1.0);
        self.timestamps.resize(n_docs, 0);
        self.group_ids.truncate(n_docs);
        self.group_ids.extend((old..n_docs).map(|row| row as GroupId));
        self.subgroup_ids.truncate(n_docs);
        self.subgroup_ids.extend((old..n_docs).map(|row| row as u32));
        for baseline in &mut self.baselines {
            baseline.resize(n_docs, 0.0);
        }
    }

    pub fn apply_order(&mut self, order: &DocumentOrder) {
        order.apply(&mut self.targets);
        order.apply(&mut self.weights);
        order.apply(&mut self.group_ids);
        order.apply(&mut self.subgroup_ids);
        order.apply(&mut self.timestamps);
        for baseline in &mut self.baselines {
            order.apply(baseline);
        }
    }

    /// Baselines as a `[n_baselines, n_docs]` matrix.
    pub fn baseline_matrix(&self) -> Result<Array2<f32>, PoolError> {
        let shape = (self.baselines.len(), self.len());
        Ok(Array2::from_shape_vec(shape, self.baselines.concat())?)
    }
}

// =============================================================================
// Group pairs
// =============================================================================

/// Pairs of one group, with indices local to the group.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupPairs {
    pub group_id: GroupId,
    /// Position of the group's first document in the pool's document order,
    /// the same order as [`DataPool::targets`] and the feature columns. The
    /// group spans `first_doc..first_doc + size` unless a timestamp sort
    /// interleaved it with other groups.
    pub first_doc: u32,
    pub size: u32,
    pub pairs: Vec<Pair>,
}

/// Split global pairs by group and rebase them to group-local offsets.
///
/// `group_ids` must be in ingestion order with every group contiguous.
/// `first_doc` is left as the ingestion position; the builder moves it to
/// document order. Groups without pairs are omitted.
pub(crate) fn build_group_pairs(group_ids: &[GroupId], pairs: &[Pair]) -> Result<Vec<GroupPairs>, PoolError> {
    let doc_count = group_ids.len();
    let ranges = group_ranges(group_ids);

    let mut doc_to_group = vec![0u32; doc_count];
    for (group, range) in ranges.iter().enumerate() {
        doc_to_group[range.clone()].fill(group as u32);
    }

    let mut grouped: Vec<Vec<Pair>> = vec![Vec::new(); ranges.len()];
    for pair in pairs {
        let (winner, loser) = (pair.winner as usize, pair.loser as usize);
        if winner >= doc_count || loser >= doc_count {
            return Err(PoolError::PairOutOfRange {
                winner: pair.winner,
                loser: pair.loser,
                doc_count,
            });
        }
        let group = doc_to_group[winner];
        if doc_to_group[loser] != group {
            return Err(PoolError::PairCrossesGroups {
                winner: pair.winner,
                loser: pair.loser,
            });
        }
        let start = ranges[group as usize].start as u32;
        grouped[group as usize].push(Pair {
            winner: pair.winner - start,
            loser: pair.loser - start,
            weight: pair.weight,
        });
    }

    Ok(ranges
        .into_iter()
        .zip(grouped)
        .filter(|(_, pairs)| !pairs.is_empty())
        .map(|(range, pairs)| GroupPairs {
            group_id: group_ids[range.start],
            first_doc: range.start as u32,
            size: range.len() as u32,
            pairs,
        })
        .collect())
}

// =============================================================================
// DataPool
// =============================================================================

/// A compiled, training-ready pool.
///
/// Every per-document array and every column is in [`DataPool::order`]
/// order. Built once by [`PoolBuilder::finish`](super::PoolBuilder::finish)
/// and never mutated afterwards.
#[derive(Clone, Debug)]
pub struct DataPool {
    pub(super) meta: PoolMetaInfo,
    pub(super) is_test: bool,
    pub(super) order: DocumentOrder,
    pub(super) shuffle_seed: Option<u64>,
    pub(super) targets: Vec<f32>,
    pub(super) weights: Vec<f32>,
    pub(super) group_ids: Option<Vec<GroupId>>,
    pub(super) subgroup_ids: Vec<u32>,
    pub(super) timestamps: Vec<u64>,
    pub(super) baselines: Array2<f32>,
    pub(super) columns: Vec<CompiledColumn>,
    pub(super) column_index: Vec<Option<usize>>,
    pub(super) feature_names: Vec<String>,
    pub(super) cat_feature_ids: BTreeSet<usize>,
    pub(super) pairs: Vec<Pair>,
    pub(super) group_pairs: Vec<GroupPairs>,
}

impl DataPool {
    // =========================================================================
    // Shape
    // =========================================================================

    #[inline]
    pub fn n_docs(&self) -> usize {
        self.targets.len()
    }

    /// Declared feature count, including dropped and ignored features.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    #[inline]
    pub fn meta(&self) -> &PoolMetaInfo {
        &self.meta
    }

    #[inline]
    pub fn is_test(&self) -> bool {
        self.is_test
    }

    // =========================================================================
    // Per-document arrays
    // =========================================================================

    pub fn order(&self) -> &DocumentOrder {
        &self.order
    }

    /// Seed of the shuffle, if the documents were shuffled.
    pub fn shuffle_seed(&self) -> Option<u64> {
        self.shuffle_seed
    }

    pub fn targets(&self) -> &[f32] {
        &self.targets
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Group ids, or `None` when every document is its own group.
    pub fn group_ids(&self) -> Option<&[GroupId]> {
        self.group_ids.as_deref()
    }

    pub fn subgroup_ids(&self) -> &[u32] {
        &self.subgroup_ids
    }

    pub fn timestamps(&self) -> &[u64] {
        &self.timestamps
    }

    /// Baselines as `[n_baselines, n_docs]`.
    pub fn baselines(&self) -> ArrayView2<'_, f32> {
        self.baselines.view()
    }

    // =========================================================================
    // Features
    // =========================================================================

    /// Compiled columns in feature-id order. Degenerate features are absent.
    pub fn columns(&self) -> &[CompiledColumn] {
        &self.columns
    }

    /// Column compiled for `feature_id`, if it survived compilation.
    pub fn column_for_feature(&self, feature_id: usize) -> Option<&CompiledColumn> {
        self.column_index
            .get(feature_id)
            .copied()
            .flatten()
            .map(|idx| &self.columns[idx])
    }

    /// Names of all declared features, including dropped ones.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn cat_feature_ids(&self) -> &BTreeSet<usize> {
        &self.cat_feature_ids
    }

    // =========================================================================
    // Pairs
    // =========================================================================

    /// Pairs as supplied, indexed by ingestion position.
    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// Pairs split by group with group-local indices.
    pub fn group_pairs(&self) -> &[GroupPairs] {
        &self.group_pairs
    }

    pub(super) fn build_indices_remap(&mut self) {
        self.column_index = vec![None; self.feature_names.len()];
        for (idx, column) in self.columns.iter().enumerate() {
            self.column_index[column.feature_id()] = Some(idx);
        }
    }
}

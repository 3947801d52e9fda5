//! Error type for pool building.

use crate::data::{BuildStage, FeatureKind, GroupId, NanMode};

/// Errors raised while ingesting or compiling a data pool.
///
/// Every variant is fatal for the call that produced it. `finish()` never
/// returns a partially built pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    // -------------------------------------------------------------------------
    // Input validation
    // -------------------------------------------------------------------------
    #[error("weights can't be negative: got {weight} for document {document}")]
    NegativeWeight { document: usize, weight: f32 },

    #[error("all weights are zero")]
    AllWeightsZero,

    #[error("pairs require group ids: groups are used to keep pairwise documents together")]
    PairsWithoutGroups,

    #[error("target is constant and there are no pairs, nothing can be learned from this pool")]
    ConstantTarget,

    #[error("feature {feature} is declared {declared:?} but received a {written} value")]
    FeatureKindMismatch {
        feature: usize,
        declared: FeatureKind,
        written: &'static str,
    },

    #[error("binarized feature {feature} is out of range (feature count {feature_count})")]
    BinarizedFeatureOutOfRange { feature: usize, feature_count: usize },

    #[error("feature {feature} is out of range (feature count {feature_count})")]
    FeatureIndexOutOfRange { feature: usize, feature_count: usize },

    #[error("row {row} is out of range (document count {doc_count})")]
    RowOutOfRange { row: usize, doc_count: usize },

    #[error("baseline {baseline} is out of range (baseline count {baseline_count})")]
    BaselineOutOfRange { baseline: usize, baseline_count: usize },

    #[error("pair ({winner}, {loser}) references a document outside [0, {doc_count})")]
    PairOutOfRange { winner: u32, loser: u32, doc_count: usize },

    #[error("pair ({winner}, {loser}) crosses a group boundary")]
    PairCrossesGroups { winner: u32, loser: u32 },

    #[error("documents of a group must be adjacent: group {group_id} reappears at row {row}")]
    GroupsNotContiguous { group_id: GroupId, row: usize },

    #[error("a pool holds at most {max} documents, got {n_docs}", max = u32::MAX)]
    TooManyDocuments { n_docs: usize },

    #[error("unsupported data scheme \"{0}\"")]
    UnsupportedScheme(String),

    #[error("target conversion failed: {0}")]
    TargetConversion(String),

    // -------------------------------------------------------------------------
    // Feature compilation
    // -------------------------------------------------------------------------
    #[error("feature {feature} contains NaN but its nan mode is forbidden")]
    NanForbidden { feature: usize },

    #[error("nan mode mismatch for feature {feature}: recorded {recorded:?}, got {requested:?}")]
    NanModeMismatch {
        feature: usize,
        recorded: NanMode,
        requested: NanMode,
    },

    #[error("bin {bin} is out of range for {bin_count} bins")]
    BinOutOfRange { bin: u32, bin_count: u32 },

    #[error("feature {feature} holds {got} values, expected {expected}")]
    BlobSizeMismatch {
        feature: usize,
        expected: usize,
        got: usize,
    },

    #[error("invalid baseline shape: {0}")]
    BaselineShape(#[from] ndarray::ShapeError),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    // -------------------------------------------------------------------------
    // Protocol
    // -------------------------------------------------------------------------
    #[error("can't finish more than once")]
    AlreadyFinished,

    #[error("can't {operation} while the builder is {stage}")]
    InvalidStage {
        operation: &'static str,
        stage: BuildStage,
    },
}

//! Value types shared by ingestion, compilation and the assembled pool.

use serde::{Deserialize, Serialize};

/// Group (query) identifier. Ungrouped documents carry their own row index.
pub type GroupId = u64;

// ============================================================================
// FeatureKind
// ============================================================================

/// How a feature's raw values are ingested and compiled.
///
/// Fixed for the lifetime of a feature once [`PoolBuilder::start`] has run.
///
/// [`PoolBuilder::start`]: super::PoolBuilder::start
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Raw floats, quantized against borders at compile time.
    Float,
    /// Raw category keys, perfect-hashed at compile time.
    Categorical,
    /// Bin indices computed upstream against caller-supplied borders.
    PrebinnedFloat,
}

impl FeatureKind {
    #[inline]
    pub fn is_categorical(self) -> bool {
        matches!(self, Self::Categorical)
    }
}

// ============================================================================
// NanMode
// ============================================================================

/// Which bin absorbs NaN values of a float feature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NanMode {
    /// NaN is not allowed; no bin is reserved.
    Forbidden,
    /// NaN goes to bin 0, before every value.
    #[default]
    Min,
    /// NaN goes to the last bin, after every value.
    Max,
}

impl NanMode {
    /// Whether a dedicated NaN bin is reserved.
    #[inline]
    pub fn has_nan_bin(self) -> bool {
        !matches!(self, Self::Forbidden)
    }
}

// ============================================================================
// FeatureValue
// ============================================================================

/// A single value written into a feature slot.
///
/// `Float` and `Category` travel the float-or-categorical channel, `Bin` the
/// pre-binarized channel. A categorical feature also accepts `Float`, keyed
/// by its bit pattern.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FeatureValue {
    Float(f32),
    Category(u32),
    Bin(u8),
}

impl FeatureValue {
    pub(crate) fn channel(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Category(_) => "category",
            Self::Bin(_) => "bin",
        }
    }
}

// ============================================================================
// Pairs
// ============================================================================

/// A pairwise preference: `winner` should rank above `loser`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    pub winner: u32,
    pub loser: u32,
    pub weight: f32,
}

impl Pair {
    pub fn new(winner: u32, loser: u32) -> Self {
        Self {
            winner,
            loser,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }
}

// ============================================================================
// Metadata descriptors
// ============================================================================

/// Shape of the incoming pool, supplied by the format layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMetaInfo {
    pub feature_count: u32,
    pub baseline_count: u32,
    pub has_group_weight: bool,
}

impl PoolMetaInfo {
    pub fn new(feature_count: u32) -> Self {
        Self {
            feature_count,
            ..Default::default()
        }
    }

    pub fn with_baselines(mut self, baseline_count: u32) -> Self {
        self.baseline_count = baseline_count;
        self
    }
}

/// A float feature that arrives already binarized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinarizedFeature {
    pub feature_id: usize,
    pub borders: Vec<f32>,
    pub nan_mode: NanMode,
}

/// All pre-binarized float features of a pool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BinarizedFeaturesMetaInfo {
    pub features: Vec<BinarizedFeature>,
}

impl BinarizedFeaturesMetaInfo {
    pub fn push(&mut self, feature_id: usize, borders: Vec<f32>, nan_mode: NanMode) {
        self.features.push(BinarizedFeature {
            feature_id,
            borders,
            nan_mode,
        });
    }
}

//! Pool assembly: from pushed raw values to packed, ordered feature columns.
//!
//! # Overview
//!
//! A format reader drives a [`PoolBuilder`], writing raw values block by
//! block into typed [`FeatureBlob`]s. [`PoolBuilder::finish`] then:
//!
//! 1. computes a [`DocumentOrder`] (timestamp sort, shuffle or identity)
//! 2. applies it to every per-document array
//! 3. compiles each feature in parallel into a [`CompiledColumn`]
//! 4. validates weights and targets
//!
//! and returns an immutable [`DataPool`].
//!
//! # Shared state
//!
//! Learn and test builders share a [`FeatureMetaStore`] (NaN modes, borders)
//! and a [`PerfectHashIndexer`] (category codes) through `Arc`, so a test
//! pool is binned exactly like the learn pool it is evaluated against.
//!
//! # Feature kinds
//!
//! - [`FeatureKind::Float`]: quantized against borders from the
//!   [`BorderBuilder`] (or the cached ones)
//! - [`FeatureKind::Categorical`]: mapped to dense perfect-hash codes
//! - [`FeatureKind::PrebinnedFloat`]: bin indices computed upstream
//!
//! Features that carry no information (no borders, at most one category)
//! are dropped from the pool.

mod blob;
mod builder;
mod column;
mod compile;
mod config;
mod meta;
mod order;
mod packed;
mod path;
mod perfect_hash;
mod pool;
mod target;
mod types;

pub mod borders;

pub use blob::FeatureBlob;
pub use builder::{BuildStage, PoolBuilder};
pub use column::{CategoricalColumn, CompiledColumn, FloatBinColumn};
pub use config::{BinarizationConfig, PoolBuilderConfig};
pub use meta::FeatureMetaStore;
pub use order::{check_groups_contiguous, group_ranges, has_groups, DocumentOrder, OrderSource, MAX_DOCUMENTS};
pub use packed::{bits_for_bin_count, PackedBins};
pub use path::PoolPath;
pub use perfect_hash::{category_key, numeric_category_key, PerfectHashIndexer};
pub use pool::{DataPool, GroupPairs};
pub use target::TargetConverter;
pub use types::{
    BinarizedFeature, BinarizedFeaturesMetaInfo, FeatureKind, FeatureValue, GroupId, NanMode,
    Pair, PoolMetaInfo,
};

pub use borders::{BorderBuilder, QuantileBorderBuilder};

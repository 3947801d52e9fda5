//! quantpool: training-ready data pools for histogram-based gradient boosting.
//!
//! Raw feature values are pushed in blocks, then compiled once into
//! bit-packed bin columns that a device trainer can upload as-is.
//!
//! # Key Types
//!
//! - [`PoolBuilder`] - Push-style ingestion and the `finish()` compile step
//! - [`DataPool`] - The compiled, ordered pool
//! - [`FeatureMetaStore`] / [`PerfectHashIndexer`] - Binning state shared
//!   between learn and test pools
//! - [`PoolBuilderConfig`] - Configuration builder
//!
//! See the [`data`] module for the full pipeline.

pub mod data;
pub mod error;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use data::{
    BinarizationConfig, CompiledColumn, DataPool, FeatureMetaStore, NanMode, PackedBins,
    PerfectHashIndexer, PoolBuilder, PoolBuilderConfig, PoolMetaInfo,
};
pub use error::PoolError;

// Shared utilities
pub use utils::{run_with_threads, Parallelism};

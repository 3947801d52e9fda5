//! Per-feature compilation of raw blobs into packed columns.
//!
//! Every feature compiles independently. The only shared state is the
//! [`FeatureMetaStore`] (NaN modes and cached borders) and the
//! [`PerfectHashIndexer`], both internally synchronized. Each task owns its
//! blob and drops it as soon as the ordered copy exists.

use super::blob::FeatureBlob;
use super::borders::{bin_count, binarize};
use super::column::{CategoricalColumn, CompiledColumn, FloatBinColumn};
use super::meta::FeatureMetaStore;
use super::order::DocumentOrder;
use super::packed::PackedBins;
use super::perfect_hash::PerfectHashIndexer;
use super::types::BinarizedFeature;
use crate::error::PoolError;
use crate::utils::run_with_threads;

/// Read-only inputs shared by all compile tasks.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CompileContext<'a> {
    pub order: &'a DocumentOrder,
    /// Caller-supplied borders of pre-binarized features, by feature id.
    pub binarized: &'a [Option<BinarizedFeature>],
    pub names: &'a [String],
    pub features_meta: &'a FeatureMetaStore,
    pub perfect_hash: &'a PerfectHashIndexer,
    pub is_test: bool,
}

/// Compile every blob. Slot `i` of the result is the column of feature `i`,
/// or `None` when the feature is ignored or carries no information.
///
/// The first failing feature aborts the whole compile.
pub(crate) fn compile_features(
    ctx: &CompileContext<'_>,
    blobs: Vec<Option<FeatureBlob>>,
    build_threads: usize,
) -> Result<Vec<Option<CompiledColumn>>, PoolError> {
    let tasks: Vec<(usize, Option<FeatureBlob>)> = blobs.into_iter().enumerate().collect();

    let results = run_with_threads(build_threads, |parallelism| {
        parallelism.maybe_par_map(tasks, |(feature_id, blob)| match blob {
            Some(blob) => compile_feature(ctx, feature_id, blob),
            None => Ok(None),
        })
    })?;

    results.into_iter().collect()
}

fn compile_feature(
    ctx: &CompileContext<'_>,
    feature_id: usize,
    blob: FeatureBlob,
) -> Result<Option<CompiledColumn>, PoolError> {
    let expected = ctx.order.len();
    if blob.len() != expected {
        return Err(PoolError::BlobSizeMismatch {
            feature: feature_id,
            expected,
            got: blob.len(),
        });
    }

    match blob {
        FeatureBlob::Categorical(raw) => compile_categorical(ctx, feature_id, raw),
        FeatureBlob::Binned(bins) => compile_prebinned(ctx, feature_id, bins),
        FeatureBlob::Float(values) => compile_float(ctx, feature_id, values),
    }
}

fn feature_name(ctx: &CompileContext<'_>, feature_id: usize) -> String {
    ctx.names
        .get(feature_id)
        .cloned()
        .unwrap_or_else(|| feature_id.to_string())
}

// =============================================================================
// Categorical
// =============================================================================

fn compile_categorical(
    ctx: &CompileContext<'_>,
    feature_id: usize,
    raw: Vec<u32>,
) -> Result<Option<CompiledColumn>, PoolError> {
    let keys = ctx.order.gather(&raw);
    drop(raw);

    let (codes, bin_count) = if ctx.is_test {
        let known = ctx.perfect_hash.unique_value_count(feature_id);
        if known <= 1 {
            tracing::debug!(feature_id, known, "categorical feature unknown to the learn set, skipped");
            return Ok(None);
        }
        let codes = ctx.perfect_hash.binarize_known(feature_id, &keys);
        // Unseen categories share the sentinel code `known`.
        let has_unseen = codes.iter().any(|&code| code == known);
        (codes, known + u32::from(has_unseen))
    } else {
        let codes = ctx.perfect_hash.update_and_binarize(feature_id, &keys);
        let unique = ctx.perfect_hash.unique_value_count(feature_id);
        if unique <= 1 {
            tracing::debug!(feature_id, unique, "categorical feature is empty");
            return Ok(None);
        }
        (codes, unique)
    };
    drop(keys);

    let bins = PackedBins::pack(&codes, bin_count)?;
    Ok(Some(CompiledColumn::Categorical(CategoricalColumn::new(
        feature_id,
        feature_name(ctx, feature_id),
        bins,
        bin_count,
    ))))
}

// =============================================================================
// Pre-binarized float
// =============================================================================

fn compile_prebinned(
    ctx: &CompileContext<'_>,
    feature_id: usize,
    raw_bins: Vec<u8>,
) -> Result<Option<CompiledColumn>, PoolError> {
    let Some(Some(info)) = ctx.binarized.get(feature_id) else {
        return Err(PoolError::BinarizedFeatureOutOfRange {
            feature: feature_id,
            feature_count: ctx.binarized.len(),
        });
    };
    if info.borders.is_empty() {
        tracing::debug!(feature_id, "float feature is empty");
        return Ok(None);
    }

    let bins = ctx.order.gather(&raw_bins);
    drop(raw_bins);

    let bin_count = bin_count(&info.borders, info.nan_mode);
    let packed = PackedBins::pack(&bins, bin_count)?;
    ctx.features_meta
        .set_or_check_nan_mode(feature_id, info.nan_mode)?;

    Ok(Some(CompiledColumn::Float(FloatBinColumn::new(
        feature_id,
        feature_name(ctx, feature_id),
        packed,
        bin_count,
        info.borders.clone(),
        info.nan_mode,
    ))))
}

// =============================================================================
// Raw float
// =============================================================================

fn compile_float(
    ctx: &CompileContext<'_>,
    feature_id: usize,
    raw: Vec<f32>,
) -> Result<Option<CompiledColumn>, PoolError> {
    let values = ctx.order.gather(&raw);
    drop(raw);

    let meta = ctx.features_meta;
    let nan_mode = meta.get_or_compute_nan_mode(feature_id, &values);

    let borders = match meta.borders(feature_id) {
        Some(cached) => cached,
        None if ctx.is_test => Vec::new(),
        None => meta.build_borders(&values, nan_mode),
    };
    if borders.is_empty() {
        tracing::debug!(feature_id, "float feature is empty");
        return Ok(None);
    }

    let bins = binarize(feature_id, &values, nan_mode, &borders)?;
    drop(values);

    let bin_count = bin_count(&borders, nan_mode);
    let packed = PackedBins::pack(&bins, bin_count)?;

    Ok(Some(CompiledColumn::Float(FloatBinColumn::new(
        feature_id,
        feature_name(ctx, feature_id),
        packed,
        bin_count,
        borders,
        nan_mode,
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::NanMode;

    struct Fixture {
        order: DocumentOrder,
        binarized: Vec<Option<BinarizedFeature>>,
        names: Vec<String>,
        meta: FeatureMetaStore,
        perfect_hash: PerfectHashIndexer,
    }

    impl Fixture {
        fn new(n_docs: usize, n_features: usize) -> Self {
            Self {
                order: DocumentOrder::identity(n_docs),
                binarized: vec![None; n_features],
                names: (0..n_features).map(|i| format!("f{i}")).collect(),
                meta: FeatureMetaStore::default(),
                perfect_hash: PerfectHashIndexer::new(),
            }
        }

        fn ctx(&self, is_test: bool) -> CompileContext<'_> {
            CompileContext {
                order: &self.order,
                binarized: &self.binarized,
                names: &self.names,
                features_meta: &self.meta,
                perfect_hash: &self.perfect_hash,
                is_test,
            }
        }
    }

    #[test]
    fn test_float_column_compiles() {
        let fx = Fixture::new(4, 1);
        let column = compile_feature(&fx.ctx(false), 0, FeatureBlob::Float(vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap()
            .unwrap();

        assert_eq!(column.name(), "f0");
        assert_eq!(column.nan_mode(), Some(NanMode::Forbidden));
        let borders = column.borders().unwrap().to_vec();
        assert!(!borders.is_empty());
        assert_eq!(column.bin_count(), borders.len() as u32 + 1);
        let bins = column.bins().unpack();
        assert!(bins.windows(2).all(|w| w[0] <= w[1]));
        // Borders are registered by the caller, not the compile task.
        assert!(!fx.meta.has_borders(0));
    }

    #[test]
    fn test_constant_float_is_dropped() {
        let fx = Fixture::new(3, 1);
        let column = compile_feature(&fx.ctx(false), 0, FeatureBlob::Float(vec![1.0; 3])).unwrap();
        assert!(column.is_none());
    }

    #[test]
    fn test_float_uses_cached_borders() {
        let fx = Fixture::new(3, 1);
        fx.meta.set_borders_if_absent(0, vec![10.0]);
        let column = compile_feature(&fx.ctx(true), 0, FeatureBlob::Float(vec![5.0, 15.0, 25.0]))
            .unwrap()
            .unwrap();
        assert_eq!(column.borders(), Some(&[10.0][..]));
        assert_eq!(column.bins().unpack(), vec![0, 1, 1]);
    }

    #[test]
    fn test_test_mode_never_computes_borders() {
        let fx = Fixture::new(3, 1);
        let column = compile_feature(&fx.ctx(true), 0, FeatureBlob::Float(vec![1.0, 2.0, 3.0])).unwrap();
        assert!(column.is_none());
    }

    #[test]
    fn test_categorical_learn_then_test() {
        let fx = Fixture::new(3, 1);
        let learn = compile_feature(&fx.ctx(false), 0, FeatureBlob::Categorical(vec![9, 8, 9]))
            .unwrap()
            .unwrap();
        assert_eq!(learn.bins().unpack(), vec![0, 1, 0]);
        assert_eq!(learn.bin_count(), 2);

        let test = compile_feature(&fx.ctx(true), 0, FeatureBlob::Categorical(vec![8, 7, 9]))
            .unwrap()
            .unwrap();
        assert_eq!(test.bins().unpack(), vec![1, 2, 0]);
        assert_eq!(test.bin_count(), 3);
        assert_eq!(fx.perfect_hash.unique_value_count(0), 2);
    }

    #[test]
    fn test_categorical_unknown_in_test_mode_is_skipped() {
        let fx = Fixture::new(2, 1);
        let column = compile_feature(&fx.ctx(true), 0, FeatureBlob::Categorical(vec![1, 2])).unwrap();
        assert!(column.is_none());
        assert_eq!(fx.perfect_hash.unique_value_count(0), 0);
    }

    #[test]
    fn test_prebinned_checks_bin_range() {
        let mut fx = Fixture::new(3, 1);
        fx.binarized[0] = Some(BinarizedFeature {
            feature_id: 0,
            borders: vec![0.5],
            nan_mode: NanMode::Forbidden,
        });
        let column = compile_feature(&fx.ctx(false), 0, FeatureBlob::Binned(vec![1, 0, 1]))
            .unwrap()
            .unwrap();
        assert_eq!(column.bin_count(), 2);
        assert_eq!(fx.meta.nan_mode(0), Some(NanMode::Forbidden));

        let err = compile_feature(&fx.ctx(false), 0, FeatureBlob::Binned(vec![0, 5, 1])).unwrap_err();
        assert!(matches!(err, PoolError::BinOutOfRange { bin: 5, bin_count: 2 }));
    }

    #[test]
    fn test_blob_size_mismatch() {
        let fx = Fixture::new(3, 1);
        let err = compile_feature(&fx.ctx(false), 0, FeatureBlob::Float(vec![1.0])).unwrap_err();
        assert!(matches!(err, PoolError::BlobSizeMismatch { feature: 0, expected: 3, got: 1 }));
    }

    #[test]
    fn test_compile_features_keeps_feature_slots() {
        let fx = Fixture::new(3, 3);
        let blobs = vec![
            Some(FeatureBlob::Float(vec![3.0, 1.0, 2.0])),
            None,
            Some(FeatureBlob::Categorical(vec![4, 4, 5])),
        ];
        let columns = compile_features(&fx.ctx(false), blobs, 2).unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].as_ref().map(|c| c.feature_id()), Some(0));
        assert!(columns[1].is_none());
        assert!(columns[2].as_ref().is_some_and(|c| c.is_categorical()));
    }

    #[test]
    fn test_compile_features_fails_on_any_feature() {
        let fx = Fixture::new(2, 2);
        let blobs = vec![
            Some(FeatureBlob::Float(vec![1.0, 2.0])),
            Some(FeatureBlob::Float(vec![1.0])),
        ];
        assert!(compile_features(&fx.ctx(false), blobs, 1).is_err());
    }
}

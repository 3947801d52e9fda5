//! Push-style pool assembly.
//!
//! A [`PoolBuilder`] is driven by a format reader through four stages:
//!
//! ```text
//! Uninitialized --start--> Started --start_next_block--> Accumulating --finish--> Finished
//! ```
//!
//! Ingestion is single-threaded. [`PoolBuilder::finish`] orders documents,
//! compiles every feature in parallel, reconciles shared metadata and
//! validates the result.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::blob::FeatureBlob;
use super::compile::{compile_features, CompileContext};
use super::column::CompiledColumn;
use super::config::PoolBuilderConfig;
use super::meta::FeatureMetaStore;
use super::order::{check_groups_contiguous, has_groups, DocumentOrder, MAX_DOCUMENTS};
use super::perfect_hash::{category_key, PerfectHashIndexer};
use super::pool::{build_group_pairs, DataPool, DocumentColumns};
use super::target::TargetConverter;
use super::types::{
    BinarizedFeature, BinarizedFeaturesMetaInfo, FeatureKind, FeatureValue, GroupId, Pair,
    PoolMetaInfo,
};
use crate::error::PoolError;

// =============================================================================
// BuildStage
// =============================================================================

/// Lifecycle stage of a [`PoolBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildStage {
    Uninitialized,
    Started,
    Accumulating,
    Finished,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Started => "started",
            Self::Accumulating => "accumulating",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

// =============================================================================
// PoolBuilder
// =============================================================================

/// Assembles a [`DataPool`] from streamed document blocks.
///
/// Learn and test builders that share one [`FeatureMetaStore`] and one
/// [`PerfectHashIndexer`] bin their features identically, provided the learn
/// pool is finished first.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use quantpool::data::{FeatureMetaStore, PerfectHashIndexer, PoolBuilder, PoolBuilderConfig, PoolMetaInfo};
///
/// let mut builder = PoolBuilder::new(
///     PoolBuilderConfig::default(),
///     Arc::new(FeatureMetaStore::default()),
///     Arc::new(PerfectHashIndexer::new()),
/// );
/// builder.start(PoolMetaInfo::new(1), 4, &[]).unwrap();
/// builder.start_next_block(4).unwrap();
/// for row in 0..4 {
///     builder.write_float(row, 0, row as f32).unwrap();
///     builder.write_target(row, (row % 2) as f32).unwrap();
/// }
/// let pool = builder.finish().unwrap();
/// assert_eq!(pool.n_docs(), 4);
/// assert!(pool.column_for_feature(0).is_some());
/// ```
pub struct PoolBuilder {
    config: PoolBuilderConfig,
    features_meta: Arc<FeatureMetaStore>,
    perfect_hash: Arc<PerfectHashIndexer>,
    target_converter: Option<Arc<dyn TargetConverter>>,
    stage: BuildStage,

    // Pre-start declarations.
    ignored: BTreeSet<usize>,
    binarized_info: BinarizedFeaturesMetaInfo,
    declared_names: Vec<String>,

    // Set by `start`.
    meta: PoolMetaInfo,
    kinds: Vec<FeatureKind>,
    binarized: Vec<Option<BinarizedFeature>>,
    cat_feature_ids: BTreeSet<usize>,
    feature_names: Vec<String>,

    // Ingested data.
    blobs: Vec<Option<FeatureBlob>>,
    docs: DocumentColumns,
    labels: Vec<String>,
    pairs: Vec<Pair>,
    block_offset: usize,
    block_size: usize,
}

impl fmt::Debug for PoolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("config", &self.config)
            .field("stage", &self.stage)
            .field("meta", &self.meta)
            .field("n_docs", &self.docs.len())
            .field("has_target_converter", &self.target_converter.is_some())
            .finish_non_exhaustive()
    }
}

impl PoolBuilder {
    pub fn new(
        config: PoolBuilderConfig,
        features_meta: Arc<FeatureMetaStore>,
        perfect_hash: Arc<PerfectHashIndexer>,
    ) -> Self {
        Self {
            config,
            features_meta,
            perfect_hash,
            target_converter: None,
            stage: BuildStage::Uninitialized,
            ignored: BTreeSet::new(),
            binarized_info: BinarizedFeaturesMetaInfo::default(),
            declared_names: Vec::new(),
            meta: PoolMetaInfo::default(),
            kinds: Vec::new(),
            binarized: Vec::new(),
            cat_feature_ids: BTreeSet::new(),
            feature_names: Vec::new(),
            blobs: Vec::new(),
            docs: DocumentColumns::default(),
            labels: Vec::new(),
            pairs: Vec::new(),
            block_offset: 0,
            block_size: 0,
        }
    }

    /// Attach a converter that rewrites targets and weights before compile.
    pub fn with_target_converter(mut self, converter: Arc<dyn TargetConverter>) -> Self {
        self.target_converter = Some(converter);
        self
    }

    #[inline]
    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    #[inline]
    pub fn config(&self) -> &PoolBuilderConfig {
        &self.config
    }

    pub fn features_meta(&self) -> &Arc<FeatureMetaStore> {
        &self.features_meta
    }

    pub fn perfect_hash(&self) -> &Arc<PerfectHashIndexer> {
        &self.perfect_hash
    }

    /// Number of documents allocated so far.
    pub fn n_docs(&self) -> usize {
        self.docs.len()
    }

    fn expect_stage(&self, operation: &'static str, allowed: &[BuildStage]) -> Result<(), PoolError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(PoolError::InvalidStage {
                operation,
                stage: self.stage,
            })
        }
    }

    // =========================================================================
    // Pre-start declarations
    // =========================================================================

    /// Features that get no blob. Writes to them are silently dropped.
    pub fn add_ignored_features(&mut self, features: impl IntoIterator<Item = usize>) -> Result<(), PoolError> {
        self.expect_stage("add_ignored_features", &[BuildStage::Uninitialized])?;
        self.ignored.extend(features);
        Ok(())
    }

    /// Declare float features that arrive as bin indices.
    pub fn set_binarized_features_meta_info(&mut self, info: BinarizedFeaturesMetaInfo) -> Result<(), PoolError> {
        self.expect_stage("set_binarized_features_meta_info", &[BuildStage::Uninitialized])?;
        self.binarized_info = info;
        Ok(())
    }

    /// Feature names by id. Missing names default to the feature index.
    pub fn set_feature_ids(&mut self, names: Vec<String>) -> Result<(), PoolError> {
        self.expect_stage("set_feature_ids", &[BuildStage::Uninitialized])?;
        self.declared_names = names;
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Classify features and allocate their blobs.
    ///
    /// `document_count` is a capacity hint; documents are added by
    /// [`start_next_block`](Self::start_next_block).
    pub fn start(
        &mut self,
        meta: PoolMetaInfo,
        document_count: usize,
        cat_features: &[usize],
    ) -> Result<(), PoolError> {
        self.expect_stage("start", &[BuildStage::Uninitialized])?;

        let feature_count = meta.feature_count as usize;
        if let Some(&feature) = cat_features.iter().find(|&&f| f >= feature_count) {
            return Err(PoolError::FeatureIndexOutOfRange {
                feature,
                feature_count,
            });
        }

        let mut binarized: Vec<Option<BinarizedFeature>> = vec![None; feature_count];
        for info in &self.binarized_info.features {
            let slot = binarized.get_mut(info.feature_id).ok_or(PoolError::BinarizedFeatureOutOfRange {
                feature: info.feature_id,
                feature_count,
            })?;
            *slot = Some(info.clone());
        }

        self.cat_feature_ids = cat_features.iter().copied().collect();
        self.kinds = (0..feature_count)
            .map(|feature| {
                if binarized[feature].is_some() {
                    FeatureKind::PrebinnedFloat
                } else if self.cat_feature_ids.contains(&feature) {
                    FeatureKind::Categorical
                } else {
                    FeatureKind::Float
                }
            })
            .collect();
        // Pre-binarized features are never categorical, whatever the caller said.
        let kinds = &self.kinds;
        self.cat_feature_ids.retain(|&feature| kinds[feature].is_categorical());

        self.blobs = self
            .kinds
            .iter()
            .enumerate()
            .map(|(feature, &kind)| {
                (!self.ignored.contains(&feature)).then(|| FeatureBlob::with_capacity(kind, document_count))
            })
            .collect();

        self.feature_names = (0..feature_count)
            .map(|feature| {
                self.declared_names
                    .get(feature)
                    .filter(|name| !name.is_empty())
                    .cloned()
                    .unwrap_or_else(|| feature.to_string())
            })
            .collect();

        self.binarized = binarized;
        self.docs = DocumentColumns::with_baselines(meta.baseline_count as usize);
        self.meta = meta;
        self.stage = BuildStage::Started;

        tracing::debug!(
            feature_count,
            document_count,
            categorical = self.cat_feature_ids.len(),
            ignored = self.ignored.len(),
            "pool builder started"
        );
        Ok(())
    }

    /// Append `block_size` default-filled documents; later writes address
    /// them by local row `0..block_size`.
    pub fn start_next_block(&mut self, block_size: usize) -> Result<(), PoolError> {
        self.expect_stage("start_next_block", &[BuildStage::Started, BuildStage::Accumulating])?;

        let n_docs = self
            .docs
            .len()
            .checked_add(block_size)
            .filter(|&n_docs| n_docs <= MAX_DOCUMENTS)
            .ok_or(PoolError::TooManyDocuments {
                n_docs: self.docs.len().saturating_add(block_size),
            })?;
        self.block_offset = self.docs.len();
        self.block_size = block_size;

        self.docs.resize(n_docs);
        if !self.labels.is_empty() {
            self.labels.resize(n_docs, String::new());
        }
        for blob in self.blobs.iter_mut().flatten() {
            blob.resize(n_docs);
        }

        self.stage = BuildStage::Accumulating;
        Ok(())
    }

    /// Global row of a local row in the current block.
    fn row(&self, local_row: usize) -> Result<usize, PoolError> {
        self.expect_stage("write", &[BuildStage::Accumulating])?;
        if local_row >= self.block_size {
            return Err(PoolError::RowOutOfRange {
                row: local_row,
                doc_count: self.block_size,
            });
        }
        Ok(self.block_offset + local_row)
    }

    // =========================================================================
    // Feature writes
    // =========================================================================

    pub fn write_value(&mut self, local_row: usize, feature: usize, value: FeatureValue) -> Result<(), PoolError> {
        let row = self.row(local_row)?;
        let feature_count = self.blobs.len();
        match self.blobs.get_mut(feature) {
            Some(Some(blob)) => blob.write(feature, row, value),
            Some(None) => Ok(()),
            None => Err(PoolError::FeatureIndexOutOfRange {
                feature,
                feature_count,
            }),
        }
    }

    pub fn write_float(&mut self, local_row: usize, feature: usize, value: f32) -> Result<(), PoolError> {
        self.write_value(local_row, feature, FeatureValue::Float(value))
    }

    /// Write a categorical value given as a string.
    pub fn write_category(&mut self, local_row: usize, feature: usize, value: &str) -> Result<(), PoolError> {
        self.write_value(local_row, feature, FeatureValue::Category(category_key(value)))
    }

    pub fn write_bin(&mut self, local_row: usize, feature: usize, bin: u8) -> Result<(), PoolError> {
        self.write_value(local_row, feature, FeatureValue::Bin(bin))
    }

    /// Write one row of float-channel values, feature `i` taking `values[i]`.
    pub fn write_all_floats(&mut self, local_row: usize, values: &[f32]) -> Result<(), PoolError> {
        for (feature, &value) in values.iter().enumerate() {
            self.write_float(local_row, feature, value)?;
        }
        Ok(())
    }

    // =========================================================================
    // Per-document writes
    // =========================================================================

    pub fn write_target(&mut self, local_row: usize, target: f32) -> Result<(), PoolError> {
        let row = self.row(local_row)?;
        self.docs.targets[row] = target;
        Ok(())
    }

    /// Raw label, handed to the target converter.
    pub fn write_label(&mut self, local_row: usize, label: impl Into<String>) -> Result<(), PoolError> {
        let row = self.row(local_row)?;
        if self.labels.is_empty() {
            self.labels.resize(self.docs.len(), String::new());
        }
        self.labels[row] = label.into();
        Ok(())
    }

    pub fn write_weight(&mut self, local_row: usize, weight: f32) -> Result<(), PoolError> {
        let row = self.row(local_row)?;
        self.docs.weights[row] = weight;
        Ok(())
    }

    /// Group weight of a document; it replaces the document weight.
    pub fn write_group_weight(&mut self, local_row: usize, weight: f32) -> Result<(), PoolError> {
        self.write_weight(local_row, weight)?;
        self.meta.has_group_weight = true;
        Ok(())
    }

    pub fn write_group_id(&mut self, local_row: usize, group_id: GroupId) -> Result<(), PoolError> {
        let row = self.row(local_row)?;
        self.docs.group_ids[row] = group_id;
        Ok(())
    }

    pub fn write_subgroup_id(&mut self, local_row: usize, subgroup_id: u32) -> Result<(), PoolError> {
        let row = self.row(local_row)?;
        self.docs.subgroup_ids[row] = subgroup_id;
        Ok(())
    }

    pub fn write_timestamp(&mut self, local_row: usize, timestamp: u64) -> Result<(), PoolError> {
        let row = self.row(local_row)?;
        self.docs.timestamps[row] = timestamp;
        Ok(())
    }

    pub fn write_baseline(&mut self, local_row: usize, baseline: usize, value: f32) -> Result<(), PoolError> {
        let row = self.row(local_row)?;
        let baseline_count = self.docs.baselines.len();
        let column = self
            .docs
            .baselines
            .get_mut(baseline)
            .ok_or(PoolError::BaselineOutOfRange {
                baseline,
                baseline_count,
            })?;
        column[row] = value;
        Ok(())
    }

    /// Pairs indexed by global ingestion position. Replaces earlier pairs.
    pub fn set_pairs(&mut self, pairs: Vec<Pair>) -> Result<(), PoolError> {
        self.expect_stage("set_pairs", &[BuildStage::Started, BuildStage::Accumulating])?;
        self.pairs = pairs;
        Ok(())
    }

    // =========================================================================
    // Finish
    // =========================================================================

    /// Compile the ingested data into a [`DataPool`].
    ///
    /// Can be called once; the builder is finished even when this fails.
    pub fn finish(&mut self) -> Result<DataPool, PoolError> {
        if self.stage == BuildStage::Finished {
            return Err(PoolError::AlreadyFinished);
        }
        self.expect_stage("finish", &[BuildStage::Started, BuildStage::Accumulating])?;
        self.stage = BuildStage::Finished;

        let started = Instant::now();
        let mut docs = std::mem::take(&mut self.docs);
        let blobs = std::mem::take(&mut self.blobs);
        let labels = std::mem::take(&mut self.labels);
        let pairs = std::mem::take(&mut self.pairs);

        let grouped = has_groups(&docs.group_ids);
        if grouped {
            check_groups_contiguous(&docs.group_ids)?;
        }

        let order = DocumentOrder::compute(&docs.timestamps, &docs.group_ids, self.config.shuffle, self.config.seed);
        debug_assert!(order.is_permutation());

        if let Some(converter) = &self.target_converter {
            converter.convert(!self.config.is_test, &labels, &mut docs.targets, &mut docs.weights)?;
        }
        drop(labels);

        let mut group_pairs = if pairs.is_empty() {
            Vec::new()
        } else if grouped {
            build_group_pairs(&docs.group_ids, &pairs)?
        } else {
            return Err(PoolError::PairsWithoutGroups);
        };

        if !order.is_identity() {
            docs.apply_order(&order);
            let positions = order.inverse();
            for group in &mut group_pairs {
                group.first_doc = positions[group.first_doc as usize];
            }
        }

        let ctx = CompileContext {
            order: &order,
            binarized: &self.binarized,
            names: &self.feature_names,
            features_meta: &self.features_meta,
            perfect_hash: &self.perfect_hash,
            is_test: self.config.is_test,
        };
        let compiled = compile_features(&ctx, blobs, self.config.build_threads)?;

        let mut columns = Vec::with_capacity(compiled.len());
        for column in compiled.into_iter().flatten() {
            if let CompiledColumn::Float(float) = &column {
                let feature_id = column.feature_id();
                if self.features_meta.set_borders_if_absent(feature_id, float.borders().to_vec()) {
                    tracing::trace!(feature_id, borders = float.borders().len(), "registered borders");
                }
            }
            columns.push(column);
        }

        validate_weights(&docs.weights)?;
        validate_target(&docs.targets, !pairs.is_empty())?;

        let shuffle_seed = order.is_shuffled().then_some(self.config.seed);
        let mut pool = DataPool {
            meta: self.meta.clone(),
            is_test: self.config.is_test,
            shuffle_seed,
            baselines: docs.baseline_matrix()?,
            targets: docs.targets,
            weights: docs.weights,
            group_ids: grouped.then_some(docs.group_ids),
            subgroup_ids: docs.subgroup_ids,
            timestamps: docs.timestamps,
            order,
            columns,
            column_index: Vec::new(),
            feature_names: std::mem::take(&mut self.feature_names),
            cat_feature_ids: std::mem::take(&mut self.cat_feature_ids),
            pairs,
            group_pairs,
        };
        pool.build_indices_remap();

        tracing::debug!(
            pool = if pool.is_test { "test" } else { "learn" },
            n_docs = pool.n_docs(),
            columns = pool.columns.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built data pool"
        );
        Ok(pool)
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_weights(weights: &[f32]) -> Result<(), PoolError> {
    if let Some((document, &weight)) = weights.iter().enumerate().find(|(_, &w)| w < 0.0) {
        return Err(PoolError::NegativeWeight { document, weight });
    }
    if weights.iter().all(|&w| w == 0.0) {
        return Err(PoolError::AllWeightsZero);
    }
    Ok(())
}

fn validate_target(targets: &[f32], has_pairs: bool) -> Result<(), PoolError> {
    let is_constant = targets.windows(2).all(|w| w[0] == w[1]);
    if !is_constant {
        return Ok(());
    }
    if !has_pairs {
        return Err(PoolError::ConstantTarget);
    }
    tracing::warn!("target is constant, only pairwise losses can learn from this pool");
    Ok(())
}

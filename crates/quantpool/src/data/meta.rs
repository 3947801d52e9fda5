//! Feature metadata shared between builders and compile workers.
//!
//! Holds the NaN mode and borders decided for each feature, so that a test
//! pool is binned exactly like the learn pool built from the same store. All
//! state sits behind one lock, taken only for individual read or write
//! sections and never across a feature's full compile.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::borders::{BorderBuilder, QuantileBorderBuilder};
use super::config::BinarizationConfig;
use super::types::NanMode;
use crate::error::PoolError;

#[derive(Debug, Default)]
struct MetaTables {
    nan_modes: HashMap<usize, NanMode>,
    borders: HashMap<usize, Vec<f32>>,
}

/// NaN-mode and border cache keyed by feature id.
#[derive(Debug)]
pub struct FeatureMetaStore {
    binarization: BinarizationConfig,
    border_builder: Arc<dyn BorderBuilder>,
    tables: Mutex<MetaTables>,
}

impl FeatureMetaStore {
    /// Store using quantile borders.
    pub fn new(binarization: BinarizationConfig) -> Self {
        Self {
            binarization,
            border_builder: Arc::new(QuantileBorderBuilder),
            tables: Mutex::new(MetaTables::default()),
        }
    }

    /// Replace the border algorithm.
    pub fn with_border_builder(mut self, border_builder: Arc<dyn BorderBuilder>) -> Self {
        self.border_builder = border_builder;
        self
    }

    #[inline]
    pub fn binarization(&self) -> &BinarizationConfig {
        &self.binarization
    }

    /// Recorded NaN mode, or a fresh decision recorded for later callers.
    ///
    /// A feature that contains NaN gets the configured mode, one without NaN
    /// gets `Forbidden`.
    pub fn get_or_compute_nan_mode(&self, feature: usize, values: &[f32]) -> NanMode {
        if let Some(&mode) = self.tables.lock().nan_modes.get(&feature) {
            return mode;
        }
        let computed = if values.iter().any(|v| v.is_nan()) {
            self.binarization.nan_mode
        } else {
            NanMode::Forbidden
        };
        *self.tables.lock().nan_modes.entry(feature).or_insert(computed)
    }

    /// Record `nan_mode`, or check it against the recorded one.
    pub fn set_or_check_nan_mode(&self, feature: usize, nan_mode: NanMode) -> Result<(), PoolError> {
        let mut tables = self.tables.lock();
        let recorded = *tables.nan_modes.entry(feature).or_insert(nan_mode);
        if recorded != nan_mode {
            return Err(PoolError::NanModeMismatch {
                feature,
                recorded,
                requested: nan_mode,
            });
        }
        Ok(())
    }

    pub fn nan_mode(&self, feature: usize) -> Option<NanMode> {
        self.tables.lock().nan_modes.get(&feature).copied()
    }

    pub fn has_borders(&self, feature: usize) -> bool {
        self.tables.lock().borders.contains_key(&feature)
    }

    pub fn borders(&self, feature: usize) -> Option<Vec<f32>> {
        self.tables.lock().borders.get(&feature).cloned()
    }

    /// Record borders unless some are already recorded. Returns whether
    /// `borders` was stored.
    pub fn set_borders_if_absent(&self, feature: usize, borders: Vec<f32>) -> bool {
        let mut tables = self.tables.lock();
        if tables.borders.contains_key(&feature) {
            return false;
        }
        tables.borders.insert(feature, borders);
        true
    }

    /// Compute borders for a column. Does not touch the cache.
    pub fn build_borders(&self, values: &[f32], nan_mode: NanMode) -> Vec<f32> {
        let config = BinarizationConfig {
            nan_mode,
            ..self.binarization.clone()
        };
        self.border_builder.build_borders(values, &config)
    }
}

impl Default for FeatureMetaStore {
    fn default() -> Self {
        Self::new(BinarizationConfig::default())
    }
}

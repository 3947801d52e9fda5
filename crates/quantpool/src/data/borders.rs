//! Bin borders for float features.
//!
//! Border selection is pluggable through [`BorderBuilder`]. Binning against a
//! border set is fixed and monotonic: with borders `b[0] < ... < b[k-1]`, a
//! value `v <= b[0]` lands in bin 0 and `v > b[k-1]` in bin `k`. A NaN bin,
//! when reserved, sits before (`NanMode::Min`) or after (`NanMode::Max`) the
//! value bins.

use std::fmt::Debug;

use super::config::BinarizationConfig;
use super::types::NanMode;
use crate::error::PoolError;

/// Chooses borders from the distribution of a float column.
pub trait BorderBuilder: Debug + Send + Sync {
    /// Sorted, strictly increasing borders for `values`.
    ///
    /// `values` may contain NaN. An empty result marks the feature as
    /// carrying no information.
    fn build_borders(&self, values: &[f32], config: &BinarizationConfig) -> Vec<f32>;
}

/// Equal-frequency borders.
///
/// Picks up to `border_count` quantiles of the non-NaN values. The maximum is
/// never a border, so the top bin is never empty. Columns larger than
/// `sample_count` are subsampled uniformly before sorting.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuantileBorderBuilder;

impl BorderBuilder for QuantileBorderBuilder {
    fn build_borders(&self, values: &[f32], config: &BinarizationConfig) -> Vec<f32> {
        let n_values = values.len();
        let step = if config.sample_count > 0 && n_values > config.sample_count {
            n_values / config.sample_count
        } else {
            1
        };

        let mut sorted: Vec<f32> = values
            .iter()
            .step_by(step.max(1))
            .copied()
            .filter(|v| !v.is_nan())
            .collect();
        if sorted.is_empty() || config.border_count == 0 {
            return Vec::new();
        }
        sorted.sort_by(f32::total_cmp);

        let n = sorted.len();
        let max_value = sorted[n - 1];
        let n_borders = config.border_count as usize;

        let mut borders = Vec::with_capacity(n_borders.min(n));
        for i in 1..=n_borders {
            let q = i as f64 / (n_borders + 1) as f64;
            let idx = ((q * (n - 1) as f64).round() as usize).min(n - 1);
            let border = sorted[idx];
            if border < max_value && borders.last().map_or(true, |&last| border > last) {
                borders.push(border);
            }
        }
        borders
    }
}

/// Number of bins implied by a border set and NaN mode.
#[inline]
pub fn bin_count(borders: &[f32], nan_mode: NanMode) -> u32 {
    borders.len() as u32 + 1 + u32::from(nan_mode.has_nan_bin())
}

/// Bin of a single value, or `None` for a NaN under `NanMode::Forbidden`.
#[inline]
pub fn binarize_value(value: f32, nan_mode: NanMode, borders: &[f32]) -> Option<u32> {
    if value.is_nan() {
        return match nan_mode {
            NanMode::Forbidden => None,
            NanMode::Min => Some(0),
            NanMode::Max => Some(borders.len() as u32 + 1),
        };
    }
    let bin = borders.partition_point(|&border| border < value) as u32;
    Some(if nan_mode == NanMode::Min { bin + 1 } else { bin })
}

/// Binarize a whole column of `feature`.
pub fn binarize(
    feature: usize,
    values: &[f32],
    nan_mode: NanMode,
    borders: &[f32],
) -> Result<Vec<u32>, PoolError> {
    values
        .iter()
        .map(|&v| binarize_value(v, nan_mode, borders).ok_or(PoolError::NanForbidden { feature }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn config(border_count: u32) -> BinarizationConfig {
        BinarizationConfig::builder().border_count(border_count).build()
    }

    #[test]
    fn test_constant_column_has_no_borders() {
        let borders = QuantileBorderBuilder.build_borders(&[1.0, 1.0, 1.0], &config(16));
        assert!(borders.is_empty());
    }

    #[test]
    fn test_all_nan_column_has_no_borders() {
        let borders = QuantileBorderBuilder.build_borders(&[f32::NAN; 4], &config(16));
        assert!(borders.is_empty());
    }

    #[test]
    fn test_small_column_uses_every_distinct_value() {
        let borders = QuantileBorderBuilder.build_borders(&[3.0, 1.0, 2.0, f32::NAN], &config(16));
        assert_eq!(borders, vec![1.0, 2.0]);
    }

    #[test]
    fn test_border_count_is_respected() {
        let values: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        let borders = QuantileBorderBuilder.build_borders(&values, &config(3));
        assert_eq!(borders.len(), 3);
        assert_abs_diff_eq!(borders[0], 250.0, epsilon = 1.0);
        assert_abs_diff_eq!(borders[1], 500.0, epsilon = 1.0);
        assert_abs_diff_eq!(borders[2], 749.0, epsilon = 1.0);
        assert!(borders.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_sampling_large_column() {
        let values: Vec<f32> = (0..10_000).map(|i| (i % 100) as f32).collect();
        let cfg = BinarizationConfig::builder()
            .border_count(4)
            .sample_count(500)
            .build();
        let borders = QuantileBorderBuilder.build_borders(&values, &cfg);
        assert!(!borders.is_empty());
        assert!(borders.len() <= 4);
        assert!(borders.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_bin_count() {
        assert_eq!(bin_count(&[1.0, 2.0], NanMode::Forbidden), 3);
        assert_eq!(bin_count(&[1.0, 2.0], NanMode::Min), 4);
        assert_eq!(bin_count(&[], NanMode::Max), 2);
    }

    #[test]
    fn test_binarize_is_monotonic() {
        let borders = [1.0, 2.0, 3.0];
        let bins: Vec<u32> = [0.5, 1.0, 1.5, 2.0, 3.0, 3.5]
            .iter()
            .map(|&v| binarize_value(v, NanMode::Forbidden, &borders).unwrap())
            .collect();
        assert_eq!(bins, vec![0, 0, 1, 1, 2, 3]);
    }

    #[test]
    fn test_binarize_nan_modes() {
        let borders = [1.0, 2.0];
        assert_eq!(binarize_value(f32::NAN, NanMode::Min, &borders), Some(0));
        assert_eq!(binarize_value(0.0, NanMode::Min, &borders), Some(1));
        assert_eq!(binarize_value(5.0, NanMode::Min, &borders), Some(3));
        assert_eq!(binarize_value(f32::NAN, NanMode::Max, &borders), Some(3));
        assert_eq!(binarize_value(5.0, NanMode::Max, &borders), Some(2));
        assert_eq!(binarize_value(f32::NAN, NanMode::Forbidden, &borders), None);
    }

    #[test]
    fn test_binarize_forbidden_nan_fails() {
        let err = binarize(7, &[1.0, f32::NAN], NanMode::Forbidden, &[0.5]).unwrap_err();
        assert!(matches!(err, PoolError::NanForbidden { feature: 7 }));
    }
}

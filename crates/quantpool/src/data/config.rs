//! Builder and binarization configuration.

use bon::Builder;
use serde::{Deserialize, Serialize};

use super::types::NanMode;

/// How float features without caller-supplied borders are quantized.
///
/// # Example
///
/// ```
/// use quantpool::data::{BinarizationConfig, NanMode};
///
/// let config = BinarizationConfig::builder()
///     .border_count(32)
///     .nan_mode(NanMode::Max)
///     .build();
/// assert_eq!(config.border_count, 32);
/// ```
#[derive(Clone, Debug, PartialEq, Builder, Serialize, Deserialize)]
#[builder(derive(Clone, Debug))]
#[serde(default)]
pub struct BinarizationConfig {
    /// Maximum number of borders per float feature (default: 128).
    #[builder(default = 128)]
    pub border_count: u32,
    /// NaN placement for features that contain NaN (default: `Min`).
    #[builder(default)]
    pub nan_mode: NanMode,
    /// Values sampled when computing borders on large columns (default: 200K).
    #[builder(default = 200_000)]
    pub sample_count: usize,
}

impl Default for BinarizationConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configuration of a single [`PoolBuilder`](super::PoolBuilder).
///
/// Quantization is not configured here: it belongs to the shared
/// [`FeatureMetaStore`](super::FeatureMetaStore), so learn and test pools
/// always bin with the same settings.
///
/// # Example
///
/// ```
/// use quantpool::data::PoolBuilderConfig;
///
/// let config = PoolBuilderConfig::builder()
///     .shuffle(true)
///     .seed(42)
///     .build_threads(4)
///     .build();
/// assert!(!config.is_test);
/// ```
#[derive(Clone, Debug, PartialEq, Builder, Serialize, Deserialize)]
#[builder(derive(Clone, Debug))]
#[serde(default, deny_unknown_fields)]
pub struct PoolBuilderConfig {
    /// Shuffle documents (ignored when timestamps are present).
    #[builder(default = false)]
    pub shuffle: bool,
    /// Seed for the shuffle.
    #[builder(default = 0)]
    pub seed: u64,
    /// Compile threads: 0 = all cores, 1 = sequential.
    #[builder(default = 0)]
    pub build_threads: usize,
    /// Test pools never compute borders or assign new category codes.
    #[builder(default = false)]
    pub is_test: bool,
}

impl Default for PoolBuilderConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolBuilderConfig::default();
        assert!(!config.shuffle);
        assert_eq!(config.build_threads, 0);

        let binarization = BinarizationConfig::default();
        assert_eq!(binarization.border_count, 128);
        assert_eq!(binarization.nan_mode, NanMode::Min);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PoolBuilderConfig = serde_json::from_str(r#"{"shuffle": true}"#).unwrap();
        assert!(config.shuffle);
        assert_eq!(config.seed, 0);

        let binarization: BinarizationConfig = serde_json::from_str(r#"{"border_count": 16}"#).unwrap();
        assert_eq!(binarization.border_count, 16);
        assert_eq!(binarization.sample_count, 200_000);
    }

    #[test]
    fn test_builder_config_rejects_binarization() {
        // Quantization settings live on the feature metadata store.
        let err = serde_json::from_str::<PoolBuilderConfig>(r#"{"binarization": {"border_count": 2}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("binarization"));
    }
}

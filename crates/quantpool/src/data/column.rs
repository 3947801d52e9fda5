//! Compiled, immutable feature columns.

use super::packed::PackedBins;
use super::types::NanMode;

/// A float feature quantized against `borders`.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatBinColumn {
    feature_id: usize,
    name: String,
    bins: PackedBins,
    bin_count: u32,
    borders: Vec<f32>,
    nan_mode: NanMode,
}

impl FloatBinColumn {
    pub fn new(
        feature_id: usize,
        name: String,
        bins: PackedBins,
        bin_count: u32,
        borders: Vec<f32>,
        nan_mode: NanMode,
    ) -> Self {
        Self {
            feature_id,
            name,
            bins,
            bin_count,
            borders,
            nan_mode,
        }
    }

    /// Borders used for binning; replaying them bins future data identically.
    pub fn borders(&self) -> &[f32] {
        &self.borders
    }

    pub fn nan_mode(&self) -> NanMode {
        self.nan_mode
    }
}

/// A categorical feature mapped to dense perfect-hash codes.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoricalColumn {
    feature_id: usize,
    name: String,
    bins: PackedBins,
    bin_count: u32,
}

impl CategoricalColumn {
    pub fn new(feature_id: usize, name: String, bins: PackedBins, bin_count: u32) -> Self {
        Self {
            feature_id,
            name,
            bins,
            bin_count,
        }
    }
}

/// A compiled feature column, ready for device upload.
#[derive(Clone, Debug, PartialEq)]
pub enum CompiledColumn {
    Float(FloatBinColumn),
    Categorical(CategoricalColumn),
}

impl CompiledColumn {
    pub fn feature_id(&self) -> usize {
        match self {
            Self::Float(c) => c.feature_id,
            Self::Categorical(c) => c.feature_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Float(c) => &c.name,
            Self::Categorical(c) => &c.name,
        }
    }

    pub fn bins(&self) -> &PackedBins {
        match self {
            Self::Float(c) => &c.bins,
            Self::Categorical(c) => &c.bins,
        }
    }

    /// Number of distinct bins (category codes for categorical columns).
    pub fn bin_count(&self) -> u32 {
        match self {
            Self::Float(c) => c.bin_count,
            Self::Categorical(c) => c.bin_count,
        }
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.bins().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins().is_empty()
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Self::Categorical(_))
    }

    pub fn borders(&self) -> Option<&[f32]> {
        match self {
            Self::Float(c) => Some(c.borders()),
            Self::Categorical(_) => None,
        }
    }

    pub fn nan_mode(&self) -> Option<NanMode> {
        match self {
            Self::Float(c) => Some(c.nan_mode),
            Self::Categorical(_) => None,
        }
    }
}

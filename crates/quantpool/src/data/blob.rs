//! Typed per-feature ingestion buffers.
//!
//! One blob per non-ignored feature, one slot per document. Blobs only grow
//! during ingestion and are consumed by the compile step.

use super::perfect_hash::numeric_category_key;
use super::types::{FeatureKind, FeatureValue};
use crate::error::PoolError;

/// Raw values of one feature, in ingestion order.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureBlob {
    /// Raw float values.
    Float(Vec<f32>),
    /// Raw category keys.
    Categorical(Vec<u32>),
    /// Bin indices of a pre-binarized float feature.
    Binned(Vec<u8>),
}

impl FeatureBlob {
    pub fn with_capacity(kind: FeatureKind, capacity: usize) -> Self {
        match kind {
            FeatureKind::Float => Self::Float(Vec::with_capacity(capacity)),
            FeatureKind::Categorical => Self::Categorical(Vec::with_capacity(capacity)),
            FeatureKind::PrebinnedFloat => Self::Binned(Vec::with_capacity(capacity)),
        }
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            Self::Float(_) => FeatureKind::Float,
            Self::Categorical(_) => FeatureKind::Categorical,
            Self::Binned(_) => FeatureKind::PrebinnedFloat,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Float(data) => data.len(),
            Self::Categorical(data) => data.len(),
            Self::Binned(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held per document.
    pub fn bytes_per_value(&self) -> usize {
        match self {
            Self::Float(_) => std::mem::size_of::<f32>(),
            Self::Categorical(_) => std::mem::size_of::<u32>(),
            Self::Binned(_) => std::mem::size_of::<u8>(),
        }
    }

    /// Grow (or shrink) to `n_docs` slots; new slots are zero.
    pub fn resize(&mut self, n_docs: usize) {
        match self {
            Self::Float(data) => data.resize(n_docs, 0.0),
            Self::Categorical(data) => data.resize(n_docs, 0),
            Self::Binned(data) => data.resize(n_docs, 0),
        }
    }

    /// Store `value` at document slot `row`.
    pub fn write(&mut self, feature: usize, row: usize, value: FeatureValue) -> Result<(), PoolError> {
        let doc_count = self.len();
        if row >= doc_count {
            return Err(PoolError::RowOutOfRange { row, doc_count });
        }
        match (self, value) {
            (Self::Float(data), FeatureValue::Float(v)) => data[row] = v,
            (Self::Categorical(data), FeatureValue::Category(key)) => data[row] = key,
            (Self::Categorical(data), FeatureValue::Float(v)) => data[row] = numeric_category_key(v),
            (Self::Binned(data), FeatureValue::Bin(bin)) => data[row] = bin,
            (blob, value) => {
                return Err(PoolError::FeatureKindMismatch {
                    feature,
                    declared: blob.kind(),
                    written: value.channel(),
                })
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_zero_fills() {
        let mut blob = FeatureBlob::with_capacity(FeatureKind::Float, 4);
        assert!(blob.is_empty());
        blob.resize(3);
        assert_eq!(blob, FeatureBlob::Float(vec![0.0; 3]));
        assert_eq!(blob.bytes_per_value(), 4);
    }

    #[test]
    fn test_write_matching_channel() {
        let mut blob = FeatureBlob::with_capacity(FeatureKind::PrebinnedFloat, 2);
        blob.resize(2);
        blob.write(0, 1, FeatureValue::Bin(7)).unwrap();
        assert_eq!(blob, FeatureBlob::Binned(vec![0, 7]));
    }

    #[test]
    fn test_categorical_accepts_numeric_categories() {
        let mut blob = FeatureBlob::with_capacity(FeatureKind::Categorical, 2);
        blob.resize(2);
        blob.write(0, 0, FeatureValue::Float(3.0)).unwrap();
        blob.write(0, 1, FeatureValue::Category(11)).unwrap();
        assert_eq!(blob, FeatureBlob::Categorical(vec![3.0f32.to_bits(), 11]));
    }

    #[test]
    fn test_write_wrong_channel() {
        let mut blob = FeatureBlob::with_capacity(FeatureKind::Float, 1);
        blob.resize(1);
        let err = blob.write(4, 0, FeatureValue::Bin(1)).unwrap_err();
        assert!(matches!(
            err,
            PoolError::FeatureKindMismatch { feature: 4, declared: FeatureKind::Float, written: "bin" }
        ));

        let mut binned = FeatureBlob::with_capacity(FeatureKind::PrebinnedFloat, 1);
        binned.resize(1);
        assert!(binned.write(0, 0, FeatureValue::Float(1.0)).is_err());
    }

    #[test]
    fn test_write_out_of_range() {
        let mut blob = FeatureBlob::with_capacity(FeatureKind::Float, 1);
        blob.resize(1);
        let err = blob.write(0, 1, FeatureValue::Float(1.0)).unwrap_err();
        assert!(matches!(err, PoolError::RowOutOfRange { row: 1, doc_count: 1 }));
    }
}

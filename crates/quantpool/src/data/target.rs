//! Target conversion hook.

use crate::error::PoolError;

/// Rewrites targets and weights from the raw labels before features compile.
///
/// Called once per [`PoolBuilder::finish`](super::PoolBuilder::finish), with
/// all arrays still in ingestion order. `labels` holds the raw label of every
/// document (empty when none was written).
pub trait TargetConverter: Send + Sync {
    fn convert(
        &self,
        is_train: bool,
        labels: &[String],
        targets: &mut [f32],
        weights: &mut [f32],
    ) -> Result<(), PoolError>;
}

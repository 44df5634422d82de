use tokio_util::sync::CancellationToken;

use crate::{BlockId, StepError};

/// The derivation pipeline turns data-availability input into L2 blocks.
///
/// The driver owns the pipeline exclusively and only ever calls it from its
/// own task, one call at a time.
#[async_trait::async_trait]
pub trait DerivationPipeline: Send + 'static {
    /// Advances derivation by one step.
    ///
    /// Returns `true` if the pipeline made progress.
    async fn pull(&mut self, cancel: &CancellationToken) -> Result<bool, StepError>;

    /// Finds the most recent block from which derivation can safely restart.
    async fn find_recovery_point(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<BlockId, StepError>;

    /// Resets the pipeline so that it continues from `recovery_point`.
    async fn recover(
        &mut self,
        cancel: &CancellationToken,
        recovery_point: BlockId,
    ) -> Result<(), StepError>;
}

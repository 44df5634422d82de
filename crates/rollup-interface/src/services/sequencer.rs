use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::StepError;

/// Proposes new L2 blocks on a schedule of its own choosing.
#[async_trait::async_trait]
pub trait Sequencer: Send + 'static {
    /// Performs one sequencing action, e.g. sealing a block.
    async fn step(&mut self, cancel: &CancellationToken) -> Result<(), StepError>;

    /// How long to wait before the next call to [`Sequencer::step`].
    fn plan(&self) -> Duration;
}

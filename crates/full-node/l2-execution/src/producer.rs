use std::time::{Duration, SystemTime, UNIX_EPOCH};

use l2_rollup_interface::services::{ChainStore, Sequencer, TransactionPool};
use l2_rollup_interface::{Address, PayloadAttributes, StepError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

use crate::ExecutionBackend;

/// A [`Sequencer`] that seals a block from the transaction pool every `block_time`.
pub struct BlockProducer<C, P> {
    backend: ExecutionBackend<C, P>,
    fee_recipient: Address,
    block_time: Duration,
    last_step: Option<Instant>,
}

impl<C, P> BlockProducer<C, P> {
    /// Creates a producer crediting fees to `fee_recipient`.
    pub fn new(backend: ExecutionBackend<C, P>, fee_recipient: Address, block_time: Duration) -> Self {
        Self {
            backend,
            fee_recipient,
            block_time,
            last_step: None,
        }
    }

    /// The backend blocks are built with.
    pub fn backend(&self) -> &ExecutionBackend<C, P> {
        &self.backend
    }
}

#[async_trait::async_trait]
impl<C, P> Sequencer for BlockProducer<C, P>
where
    C: ChainStore + 'static,
    P: TransactionPool + 'static,
{
    async fn step(&mut self, _cancel: &CancellationToken) -> Result<(), StepError> {
        self.last_step = Some(Instant::now());

        let parent = self.backend.chain().current_header();
        let attributes = PayloadAttributes {
            timestamp: unix_timestamp().max(parent.timestamp.saturating_add(1)),
            suggested_fee_recipient: self.fee_recipient,
            ..Default::default()
        };
        match self.backend.build_payload(&attributes)? {
            Some(block) => info!(%block, "Sequenced block"),
            None => trace!(parent = %parent.id(), "Nothing to sequence"),
        }
        Ok(())
    }

    fn plan(&self) -> Duration {
        self.last_step.map_or(Duration::ZERO, |last| {
            (last + self.block_time).saturating_duration_since(Instant::now())
        })
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

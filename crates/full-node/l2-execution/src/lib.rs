//! Execution backend of the L2 node.
//!
//! [`ExecutionBackend`] applies fork-choice decisions to a [`ChainStore`] and
//! builds new blocks from payload attributes and a [`TransactionPool`].
//! [`BlockProducer`] drives it as a [`Sequencer`](l2_rollup_interface::services::Sequencer).
//!
//! [`ChainStore`]: l2_rollup_interface::services::ChainStore
//! [`TransactionPool`]: l2_rollup_interface::services::TransactionPool

mod builder;
mod config;
mod forkchoice;
mod gas;
#[cfg(feature = "mock")]
pub mod mock;
mod producer;
mod signer;
#[cfg(test)]
mod tests;

pub use builder::{BuildError, TransactionsByPriceAndNonce};
pub use config::ExecutionConfig;
pub use forkchoice::{ForkchoiceError, Marker};
pub use gas::{calc_gas_limit, GAS_LIMIT_BOUND_DIVISOR, MIN_GAS_LIMIT};
pub use producer::BlockProducer;
pub use signer::{address_of, SignerError, TransactionSigner};

/// Applies fork-choice updates and builds payloads on top of a chain.
///
/// All operations run synchronously on the caller's task.
pub struct ExecutionBackend<C, P> {
    chain: C,
    pool: P,
    config: ExecutionConfig,
    signer: TransactionSigner,
}

impl<C, P> ExecutionBackend<C, P> {
    /// Creates a backend over `chain` drawing transactions from `pool`.
    pub fn new(chain: C, pool: P, config: ExecutionConfig) -> Self {
        let signer = TransactionSigner::new(config.chain_id);
        Self {
            chain,
            pool,
            config,
            signer,
        }
    }

    /// The chain the backend operates on.
    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// The backend configuration.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use ethereum_types::{Address, H256};

use crate::{Block, Header, Receipt, Transaction};

/// Errors reported by a [`ChainStore`].
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The referenced block is not known locally.
    #[error("unknown block {0:?}")]
    UnknownBlock(H256),
    /// No state is available for the given root.
    #[error("missing state for root {0:?}")]
    MissingState(H256),
    /// Switching the canonical chain failed part way through.
    #[error("failed to make {target:?} canonical, last valid block is {latest_valid_hash:?}")]
    Reorg {
        /// Requested new head.
        target: H256,
        /// Most recent block that is still known to be valid.
        latest_valid_hash: H256,
    },
    /// The underlying database failed.
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

impl ChainError {
    /// Best-effort hash of the last valid block, if the error carries one.
    pub fn latest_valid_hash(&self) -> Option<H256> {
        match self {
            Self::Reorg {
                latest_valid_hash, ..
            } => Some(*latest_valid_hash),
            _ => None,
        }
    }
}

/// Block storage and canonical chain bookkeeping of the execution layer.
pub trait ChainStore: Send {
    /// Mutable world state handed out by [`ChainStore::state_at`].
    type State: StateDatabase;

    /// Looks up a block by hash, canonical or not.
    fn block_by_hash(&self, hash: H256) -> Option<Block>;

    /// Looks up a header by hash, canonical or not.
    fn header_by_hash(&self, hash: H256) -> Option<Header>;

    /// Hash of the canonical block at `number`.
    fn canonical_hash(&self, number: u64) -> Option<H256>;

    /// Header of the current canonical head.
    fn current_header(&self) -> Header;

    /// Makes `block` the canonical head, rewriting the canonical chain as needed.
    ///
    /// Returns the hash of the new head.
    fn set_canonical(&mut self, block: &Block) -> Result<H256, ChainError>;

    /// Marks `header` as the safe block.
    fn set_safe(&mut self, header: &Header);

    /// Marks `header` as the finalized block.
    fn set_finalized(&mut self, header: &Header);

    /// Opens the state identified by `root` for modification.
    fn state_at(&self, root: H256) -> Result<Self::State, ChainError>;

    /// Persists a freshly built block with its receipts and post-state and makes it the head.
    fn write_block_and_set_head(
        &mut self,
        block: Block,
        receipts: Vec<Receipt>,
        state: Self::State,
    ) -> Result<(), ChainError>;
}

/// Errors raised when a transaction cannot be applied to the state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    /// The transaction nonce was already used by the sender.
    #[error("nonce too low: address {address:?}, tx: {tx} state: {state}")]
    NonceTooLow {
        /// Sender of the transaction.
        address: Address,
        /// Nonce carried by the transaction.
        tx: u64,
        /// Next nonce expected by the state.
        state: u64,
    },
    /// The transaction skips one or more nonces.
    #[error("nonce too high: address {address:?}, tx: {tx} state: {state}")]
    NonceTooHigh {
        /// Sender of the transaction.
        address: Address,
        /// Nonce carried by the transaction.
        tx: u64,
        /// Next nonce expected by the state.
        state: u64,
    },
    /// The block has no gas left for the transaction.
    #[error("gas limit reached")]
    GasLimitReached,
    /// The transaction's gas limit does not cover its intrinsic gas.
    #[error("intrinsic gas too low: have {have}, want {want}")]
    IntrinsicGas {
        /// Gas limit of the transaction.
        have: u64,
        /// Intrinsic gas of the transaction.
        want: u64,
    },
    /// The sender cannot pay for value plus gas.
    #[error("insufficient funds for gas * price + value: address {0:?}")]
    InsufficientFunds(Address),
    /// Execution failed for another reason.
    #[error("{0}")]
    Execution(String),
}

impl ApplyError {
    /// Returns `true` if the transaction's nonce is behind the sender's state nonce.
    pub fn is_nonce_too_low(&self) -> bool {
        matches!(self, Self::NonceTooLow { .. })
    }
}

/// Remaining gas of the block being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPool(u64);

impl GasPool {
    /// Creates a pool holding `gas`.
    pub fn new(gas: u64) -> Self {
        Self(gas)
    }

    /// Gas still available.
    pub fn gas(&self) -> u64 {
        self.0
    }

    /// Reserves `amount` of gas.
    pub fn sub_gas(&mut self, amount: u64) -> Result<(), ApplyError> {
        self.0 = self
            .0
            .checked_sub(amount)
            .ok_or(ApplyError::GasLimitReached)?;
        Ok(())
    }

    /// Returns `amount` of unused gas.
    pub fn add_gas(&mut self, amount: u64) {
        self.0 = self.0.saturating_add(amount);
    }
}

/// Mutable world state a block is built against.
pub trait StateDatabase: Send {
    /// Takes a snapshot and returns its revision id.
    fn snapshot(&mut self) -> usize;

    /// Discards every change made after the snapshot `revision` was taken.
    fn revert_to_snapshot(&mut self, revision: usize);

    /// Executes `tx` from `sender` on top of the current state.
    ///
    /// `used_gas` accumulates the gas used by the block so far.
    fn apply_transaction(
        &mut self,
        header: &Header,
        tx: &Transaction,
        sender: Address,
        gas_pool: &mut GasPool,
        used_gas: &mut u64,
    ) -> Result<Receipt, ApplyError>;

    /// Computes the current state root.
    fn intermediate_root(&mut self) -> H256;

    /// Starts warming state reads in the background.
    fn start_prefetcher(&mut self, namespace: &str);

    /// Stops the background prefetcher.
    fn stop_prefetcher(&mut self);
}

/// Source of pending transactions for block building.
pub trait TransactionPool: Send + Sync {
    /// Executable transactions grouped by sender, each group sorted by nonce.
    fn pending(&self) -> HashMap<Address, Vec<Transaction>>;

    /// Drops every transaction of `sender` with a nonce below `nonce`.
    ///
    /// Called after a block is sealed with the next nonce of each included sender.
    fn remove_below(&self, sender: Address, nonce: u64);
}

impl<T: TransactionPool + ?Sized> TransactionPool for Arc<T> {
    fn pending(&self) -> HashMap<Address, Vec<Transaction>> {
        (**self).pending()
    }

    fn remove_below(&self, sender: Address, nonce: u64) {
        (**self).remove_below(sender, nonce);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_pool_rejects_overdraw() {
        let mut pool = GasPool::new(30_000);
        pool.sub_gas(21_000).unwrap();
        assert_eq!(pool.sub_gas(21_000), Err(ApplyError::GasLimitReached));
        assert_eq!(pool.gas(), 9_000);
        pool.add_gas(1_000);
        assert_eq!(pool.gas(), 10_000);
    }

    #[test]
    fn only_reorg_errors_carry_latest_valid_hash() {
        let hash = H256::repeat_byte(1);
        let err = ChainError::Reorg {
            target: H256::repeat_byte(2),
            latest_valid_hash: hash,
        };
        assert_eq!(err.latest_valid_hash(), Some(hash));
        assert_eq!(ChainError::UnknownBlock(hash).latest_valid_hash(), None);
    }
}

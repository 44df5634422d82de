mod ordering;

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use l2_metrics::update_metrics;
use l2_rollup_interface::rlp::DecoderError;
use l2_rollup_interface::services::{
    ApplyError, ChainError, ChainStore, GasPool, StateDatabase, TransactionPool,
};
use l2_rollup_interface::{
    empty_uncle_hash, ordered_commitment, Address, Block, BlockId, Header, PayloadAttributes,
    Receipt, StepError, Transaction, TX_GAS, U256,
};
pub use ordering::TransactionsByPriceAndNonce;
use tracing::{debug, info, trace, warn};

use crate::{calc_gas_limit, ExecutionBackend};

/// Errors aborting a payload build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The chain could not provide the parent state or persist the block.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// A forced transaction is not valid RLP.
    #[error("failed to decode forced transaction {index}: {source}")]
    Decode {
        /// Position in the payload attributes.
        index: usize,
        /// Decoder failure.
        source: DecoderError,
    },
}

/// Database failures are transient, other chain failures mean the local view of
/// the chain is broken and needs recovery, and undecodable forced input is final.
impl From<BuildError> for StepError {
    fn from(err: BuildError) -> Self {
        if matches!(err, BuildError::Chain(ChainError::Database(_))) {
            StepError::retryable(err)
        } else if matches!(err, BuildError::Chain(_)) {
            StepError::recoverable(err)
        } else {
            StepError::Fatal(err.into())
        }
    }
}

/// Keeps the state prefetcher running while alive and stops it on drop.
struct Prefetcher<'a, S: StateDatabase> {
    state: &'a mut S,
}

impl<'a, S: StateDatabase> Prefetcher<'a, S> {
    fn start(state: &'a mut S, namespace: &str) -> Self {
        state.start_prefetcher(namespace);
        Self { state }
    }
}

impl<S: StateDatabase> Drop for Prefetcher<'_, S> {
    fn drop(&mut self) {
        self.state.stop_prefetcher();
    }
}

impl<S: StateDatabase> Deref for Prefetcher<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.state
    }
}

impl<S: StateDatabase> DerefMut for Prefetcher<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.state
    }
}

/// Working set of a block under construction.
struct Environment<'a, S> {
    header: Header,
    state: &'a mut S,
    gas_pool: GasPool,
    used_gas: u64,
    tcount: usize,
    transactions: Vec<Transaction>,
    receipts: Vec<Receipt>,
    next_nonces: BTreeMap<Address, u64>,
}

/// A sealed block with its receipts and the next nonce of every included sender.
struct Sealed {
    block: Block,
    receipts: Vec<Receipt>,
    next_nonces: BTreeMap<Address, u64>,
}

impl<'a, S: StateDatabase> Environment<'a, S> {
    fn new(header: Header, state: &'a mut S) -> Self {
        Self {
            gas_pool: GasPool::new(header.gas_limit),
            header,
            state,
            used_gas: 0,
            tcount: 0,
            transactions: Vec::new(),
            receipts: Vec::new(),
            next_nonces: BTreeMap::new(),
        }
    }

    /// Applies `tx` on top of the current state, leaving the state untouched on failure.
    fn commit_transaction(&mut self, tx: &Transaction, sender: Address) -> Result<(), ApplyError> {
        let snapshot = self.state.snapshot();
        match self.state.apply_transaction(
            &self.header,
            tx,
            sender,
            &mut self.gas_pool,
            &mut self.used_gas,
        ) {
            Ok(receipt) => {
                self.transactions.push(tx.clone());
                self.receipts.push(receipt);
                self.next_nonces.insert(sender, tx.nonce.saturating_add(1));
                self.tcount += 1;
                Ok(())
            }
            Err(err) => {
                self.state.revert_to_snapshot(snapshot);
                Err(err)
            }
        }
    }

    /// Finalizes the header and stamps receipts and logs with their block context.
    ///
    /// Returns `None` if no transaction was committed.
    fn seal(self) -> Option<Sealed> {
        let Self {
            mut header,
            state,
            used_gas,
            tcount,
            transactions,
            mut receipts,
            next_nonces,
            ..
        } = self;

        header.state_root = state.intermediate_root();
        if tcount == 0 {
            return None;
        }
        header.uncle_hash = empty_uncle_hash();
        header.gas_used = used_gas;
        header.transactions_root = ordered_commitment(&transactions);
        header.receipts_root = ordered_commitment(&receipts);

        let hash = header.hash();
        let number = header.number;
        let mut log_index = 0;
        for (index, receipt) in receipts.iter_mut().enumerate() {
            receipt.block_hash = hash;
            receipt.block_number = number;
            receipt.transaction_index = index as u64;
            for log in &mut receipt.logs {
                log.block_hash = hash;
                log.block_number = number;
                log.transaction_hash = receipt.transaction_hash;
                log.transaction_index = index as u64;
                log.log_index = log_index;
                log_index += 1;
            }
        }

        Some(Sealed {
            block: Block {
                header,
                transactions,
            },
            receipts,
            next_nonces,
        })
    }
}

impl<C: ChainStore, P: TransactionPool> ExecutionBackend<C, P> {
    /// Builds a block on top of the current head and makes it the new head.
    ///
    /// Forced transactions from `attributes` are included first, then pool
    /// transactions unless `no_tx_pool` is set. A forced transaction that does
    /// not decode aborts the build; one that fails to apply is skipped. A build
    /// that ends up with no transactions leaves the chain untouched and returns
    /// `Ok(None)`. Included transactions are evicted from the pool.
    pub fn build_payload(
        &mut self,
        attributes: &PayloadAttributes,
    ) -> Result<Option<BlockId>, BuildError> {
        let parent = self.chain.current_header();
        let header = self.draft_header(&parent, attributes);
        let mut state = self.chain.state_at(parent.state_root)?;

        let sealed = {
            let mut prefetcher = Prefetcher::start(&mut state, "miner");
            let mut env = Environment::new(header, &mut *prefetcher);
            self.fill_transactions(&mut env, attributes)?;
            env.seal()
        };

        let Some(Sealed {
            block,
            receipts,
            next_nonces,
        }) = sealed
        else {
            debug!(parent = %parent.id(), "No transactions to include, skipping block");
            return Ok(None);
        };

        let id = block.id();
        let tcount = block.transactions.len() as u64;
        let gas_used = block.header.gas_used;
        self.chain.write_block_and_set_head(block, receipts, state)?;
        for (sender, nonce) in next_nonces {
            self.pool.remove_below(sender, nonce);
        }

        info!(block = %id, txs = tcount, gas_used, "Sealed new block");
        update_metrics(|metrics| {
            metrics.blocks_built.inc();
            metrics.transactions_included.inc_by(tcount);
            metrics.head_number.set(i64::try_from(id.number).unwrap_or(i64::MAX));
        });
        Ok(Some(id))
    }

    fn draft_header(&self, parent: &Header, attributes: &PayloadAttributes) -> Header {
        Header {
            parent_hash: parent.hash(),
            number: parent.number.saturating_add(1),
            gas_limit: calc_gas_limit(parent.gas_limit, self.config.gas_ceil),
            timestamp: attributes.timestamp,
            coinbase: attributes.suggested_fee_recipient,
            difficulty: U256::one(),
            ..Default::default()
        }
    }

    fn fill_transactions<S: StateDatabase>(
        &self,
        env: &mut Environment<'_, S>,
        attributes: &PayloadAttributes,
    ) -> Result<(), BuildError> {
        let forced = attributes
            .transactions
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                Transaction::decode(raw).map_err(|source| BuildError::Decode { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut skipped = 0u64;
        for (index, tx) in forced.iter().enumerate() {
            let sender = match self.signer.sender(tx) {
                Ok(sender) => sender,
                Err(err) => {
                    warn!(index, hash = ?tx.hash(), %err, "Skipping forced transaction with invalid signature");
                    skipped += 1;
                    continue;
                }
            };
            if let Err(err) = env.commit_transaction(tx, sender) {
                warn!(index, ?sender, hash = ?tx.hash(), %err, "Forced transaction failed to apply, skipped");
                skipped += 1;
            }
        }
        update_metrics(|metrics| metrics.transactions_skipped.inc_by(skipped));

        if attributes.no_tx_pool {
            return Ok(());
        }

        let pending = self.pool.pending();
        if pending.is_empty() {
            return Ok(());
        }
        let mut txs = TransactionsByPriceAndNonce::new(pending);
        self.commit_transactions(env, &mut txs);
        Ok(())
    }

    fn commit_transactions<S: StateDatabase>(
        &self,
        env: &mut Environment<'_, S>,
        txs: &mut TransactionsByPriceAndNonce,
    ) {
        let mut skipped = 0u64;
        loop {
            if env.gas_pool.gas() < TX_GAS {
                trace!(have = env.gas_pool.gas(), want = TX_GAS, "Not enough gas for further transactions");
                break;
            }
            let Some((sender, tx)) = txs.peek() else {
                break;
            };

            if tx.is_protected() && !self.config.is_eip155(env.header.number) {
                trace!(hash = ?tx.hash(), eip155 = self.config.eip155_block, "Ignoring replay protected transaction");
                skipped += 1;
                txs.shift();
                continue;
            }

            match env.commit_transaction(tx, sender) {
                Ok(()) => txs.shift(),
                Err(err) if err.is_nonce_too_low() => {
                    trace!(?sender, nonce = tx.nonce, "Skipping transaction with low nonce");
                    skipped += 1;
                    txs.shift();
                }
                Err(err) => {
                    debug!(?sender, hash = ?tx.hash(), %err, "Transaction failed, account skipped");
                    skipped += 1;
                    txs.pop();
                }
            }
        }
        update_metrics(|metrics| metrics.transactions_skipped.inc_by(skipped));
    }
}

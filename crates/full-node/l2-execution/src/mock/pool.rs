use std::collections::{BTreeMap, HashMap};

use dashmap::DashMap;
use l2_rollup_interface::services::TransactionPool;
use l2_rollup_interface::{Address, Transaction};

use crate::{SignerError, TransactionSigner};

/// A [`TransactionPool`] holding every added transaction until it is removed.
///
/// Transactions are keyed by sender and nonce; adding a transaction with the
/// same nonce replaces the previous one.
#[derive(Debug)]
pub struct MemoryPool {
    signer: TransactionSigner,
    transactions: DashMap<Address, BTreeMap<u64, Transaction>>,
}

impl MemoryPool {
    /// Creates an empty pool recovering senders with `signer`.
    pub fn new(signer: TransactionSigner) -> Self {
        Self {
            signer,
            transactions: DashMap::new(),
        }
    }

    /// Adds a signed transaction and returns its sender.
    pub fn add(&self, tx: Transaction) -> Result<Address, SignerError> {
        let sender = self.signer.sender(&tx)?;
        self.transactions
            .entry(sender)
            .or_default()
            .insert(tx.nonce, tx);
        Ok(sender)
    }

    /// Number of transactions in the pool.
    pub fn len(&self) -> usize {
        self.transactions.iter().map(|entry| entry.value().len()).sum()
    }

    /// Returns `true` if the pool holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionPool for MemoryPool {
    fn pending(&self) -> HashMap<Address, Vec<Transaction>> {
        self.transactions
            .iter()
            .map(|entry| (*entry.key(), entry.value().values().cloned().collect()))
            .collect()
    }

    fn remove_below(&self, sender: Address, nonce: u64) {
        if let Some(mut txs) = self.transactions.get_mut(&sender) {
            *txs = txs.split_off(&nonce);
        }
        self.transactions.retain(|_, txs| !txs.is_empty());
    }
}

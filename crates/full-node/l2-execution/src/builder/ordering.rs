use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use l2_rollup_interface::{Address, Transaction};

/// A sender's next executable transaction, ordered by effective gas price.
#[derive(Debug)]
struct Head {
    sender: Address,
    tx: Transaction,
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tx
            .effective_gas_price()
            .cmp(&other.tx.effective_gas_price())
            // Equal prices: lower sender address first.
            .then_with(|| other.sender.cmp(&self.sender))
    }
}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Head {}

/// Pending transactions ordered by price across senders and by nonce within a sender.
///
/// Only the head transaction of every sender competes on price; the rest of a
/// sender's queue becomes visible as its predecessors are shifted out.
#[derive(Debug, Default)]
pub struct TransactionsByPriceAndNonce {
    heads: BinaryHeap<Head>,
    queues: HashMap<Address, VecDeque<Transaction>>,
}

impl TransactionsByPriceAndNonce {
    /// Builds the ordering from per-sender transaction lists.
    pub fn new(pending: HashMap<Address, Vec<Transaction>>) -> Self {
        let mut ordering = Self::default();
        for (sender, mut txs) in pending {
            txs.sort_by_key(|tx| tx.nonce);
            let mut queue = VecDeque::from(txs);
            if let Some(tx) = queue.pop_front() {
                ordering.heads.push(Head { sender, tx });
                ordering.queues.insert(sender, queue);
            }
        }
        ordering
    }

    /// The best transaction and its sender, without removing it.
    pub fn peek(&self) -> Option<(Address, &Transaction)> {
        self.heads.peek().map(|head| (head.sender, &head.tx))
    }

    /// Replaces the best transaction with the next one from the same sender.
    pub fn shift(&mut self) {
        if let Some(Head { sender, .. }) = self.heads.pop() {
            if let Some(tx) = self.queues.get_mut(&sender).and_then(VecDeque::pop_front) {
                self.heads.push(Head { sender, tx });
            }
        }
    }

    /// Removes the best transaction and every remaining transaction of its sender.
    pub fn pop(&mut self) {
        if let Some(Head { sender, .. }) = self.heads.pop() {
            self.queues.remove(&sender);
        }
    }

    /// Returns `true` when no transactions are left.
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }
}

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use l2_rollup_interface::rlp::RlpStream;
use l2_rollup_interface::services::{ApplyError, GasPool, StateDatabase};
use l2_rollup_interface::{keccak256, Address, Header, Log, Receipt, Transaction, H256, U256};

/// Balance and nonce of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Account {
    /// Next nonce the account may use.
    pub nonce: u64,
    /// Spendable balance.
    pub balance: U256,
}

impl Account {
    /// An account holding `balance` with nonce zero.
    pub fn with_balance(balance: U256) -> Self {
        Self { nonce: 0, balance }
    }
}

pub(crate) type Accounts = BTreeMap<Address, Account>;

/// Observations shared between a [`MemoryChain`](super::MemoryChain) and the states it hands out.
#[derive(Debug, Default)]
pub(crate) struct StateProbe {
    attempted: Mutex<Vec<H256>>,
    prefetchers: AtomicUsize,
}

impl StateProbe {
    pub(crate) fn attempted(&self) -> Vec<H256> {
        self.attempted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn active_prefetchers(&self) -> usize {
        self.prefetchers.load(Ordering::SeqCst)
    }
}

pub(crate) fn state_root(accounts: &Accounts) -> H256 {
    let mut stream = RlpStream::new_list(accounts.len());
    for (address, account) in accounts {
        stream.begin_list(3);
        stream.append(address);
        stream.append(&account.nonce);
        stream.append(&account.balance);
    }
    keccak256(stream.out())
}

fn create_address(sender: Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(&sender);
    stream.append(&nonce);
    Address::from_slice(&keccak256(stream.out()).as_bytes()[12..])
}

/// A [`StateDatabase`] of plain value transfers.
///
/// Transactions pay their intrinsic gas only. A transaction with call data
/// emits one log from the recipient, topic `keccak(data)`.
#[derive(Debug, Clone)]
pub struct MemoryState {
    accounts: Accounts,
    snapshots: Vec<Accounts>,
    prefetching: bool,
    probe: Arc<StateProbe>,
}

impl MemoryState {
    pub(crate) fn new(accounts: Accounts, probe: Arc<StateProbe>) -> Self {
        Self {
            accounts,
            snapshots: Vec::new(),
            prefetching: false,
            probe,
        }
    }

    pub(crate) fn into_accounts(self) -> Accounts {
        self.accounts
    }

    /// The account at `address`, empty if it was never touched.
    pub fn account(&self, address: Address) -> Account {
        self.accounts.get(&address).copied().unwrap_or_default()
    }
}

impl StateDatabase for MemoryState {
    fn snapshot(&mut self) -> usize {
        self.snapshots.push(self.accounts.clone());
        self.snapshots.len() - 1
    }

    fn revert_to_snapshot(&mut self, revision: usize) {
        if revision >= self.snapshots.len() {
            return;
        }
        self.snapshots.truncate(revision + 1);
        if let Some(saved) = self.snapshots.pop() {
            self.accounts = saved;
        }
    }

    fn apply_transaction(
        &mut self,
        header: &Header,
        tx: &Transaction,
        sender: Address,
        gas_pool: &mut GasPool,
        used_gas: &mut u64,
    ) -> Result<Receipt, ApplyError> {
        let hash = tx.hash();
        self.probe
            .attempted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hash);

        let account = self.account(sender);
        if tx.nonce < account.nonce {
            return Err(ApplyError::NonceTooLow {
                address: sender,
                tx: tx.nonce,
                state: account.nonce,
            });
        }
        if tx.nonce > account.nonce {
            return Err(ApplyError::NonceTooHigh {
                address: sender,
                tx: tx.nonce,
                state: account.nonce,
            });
        }

        let intrinsic = tx.intrinsic_gas();
        if tx.gas_limit < intrinsic {
            return Err(ApplyError::IntrinsicGas {
                have: tx.gas_limit,
                want: intrinsic,
            });
        }
        let max_cost = tx
            .gas_price
            .saturating_mul(U256::from(tx.gas_limit))
            .saturating_add(tx.value);
        if account.balance < max_cost {
            return Err(ApplyError::InsufficientFunds(sender));
        }
        gas_pool.sub_gas(tx.gas_limit)?;
        gas_pool.add_gas(tx.gas_limit - intrinsic);

        let fee = tx.gas_price.saturating_mul(U256::from(intrinsic));
        let recipient = tx.to.unwrap_or_else(|| create_address(sender, tx.nonce));

        let from = self.accounts.entry(sender).or_default();
        from.nonce += 1;
        from.balance = from.balance.saturating_sub(fee.saturating_add(tx.value));
        let to = self.accounts.entry(recipient).or_default();
        to.balance = to.balance.saturating_add(tx.value);
        let coinbase = self.accounts.entry(header.coinbase).or_default();
        coinbase.balance = coinbase.balance.saturating_add(fee);

        *used_gas += intrinsic;
        let logs = if tx.data.is_empty() {
            Vec::new()
        } else {
            vec![Log {
                address: recipient,
                topics: vec![keccak256(&tx.data)],
                data: tx.data.clone(),
                transaction_hash: hash,
                ..Default::default()
            }]
        };

        Ok(Receipt {
            success: true,
            cumulative_gas_used: *used_gas,
            gas_used: intrinsic,
            logs,
            transaction_hash: hash,
            ..Default::default()
        })
    }

    fn intermediate_root(&mut self) -> H256 {
        state_root(&self.accounts)
    }

    fn start_prefetcher(&mut self, _namespace: &str) {
        if !self.prefetching {
            self.prefetching = true;
            self.probe.prefetchers.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn stop_prefetcher(&mut self) {
        if self.prefetching {
            self.prefetching = false;
            self.probe.prefetchers.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

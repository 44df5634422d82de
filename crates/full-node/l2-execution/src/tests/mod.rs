
use std::sync::Arc;

use l2_rollup_interface::{Address, PayloadAttributes, Transaction, U256};
use secp256k1::SecretKey;

use crate::mock::{Account, MemoryChain, MemoryPool};
use crate::{address_of, ExecutionBackend, ExecutionConfig, TransactionSigner};

pub(crate) const CHAIN_ID: u64 = 901;
pub(crate) const GAS_LIMIT: u64 = 30_000_000;
pub(crate) const ONE_GWEI: u64 = 1_000_000_000;

/// A funded externally owned account.
pub(crate) struct TestAccount {
    pub(crate) key: SecretKey,
    pub(crate) address: Address,
}

impl TestAccount {
    pub(crate) fn new(seed: u8) -> Self {
        let key = SecretKey::from_slice(&[seed; 32]).unwrap();
        Self {
            address: address_of(&key),
            key,
        }
    }

    /// A signed, replay-protected transfer of `value` wei.
    pub(crate) fn transfer(&self, nonce: u64, gas_price_gwei: u64, value: u64) -> Transaction {
        signer().sign(unsigned(nonce, gas_price_gwei, value), &self.key).unwrap()
    }

    /// Same as [`Self::transfer`] but without replay protection.
    pub(crate) fn unprotected_transfer(&self, nonce: u64, gas_price_gwei: u64) -> Transaction {
        signer()
            .sign_unprotected(unsigned(nonce, gas_price_gwei, 1), &self.key)
            .unwrap()
    }

    /// A replay-protected call carrying `data`.
    pub(crate) fn call(&self, nonce: u64, data: Vec<u8>) -> Transaction {
        let mut tx = unsigned(nonce, 1, 0);
        tx.gas_limit = 100_000;
        tx.data = data;
        signer().sign(tx, &self.key).unwrap()
    }
}

fn unsigned(nonce: u64, gas_price_gwei: u64, value: u64) -> Transaction {
    Transaction {
        nonce,
        gas_price: U256::from(gas_price_gwei) * U256::from(ONE_GWEI),
        gas_limit: 21_000,
        to: Some(Address::repeat_byte(0xee)),
        value: U256::from(value),
        ..Default::default()
    }
}

pub(crate) fn signer() -> TransactionSigner {
    TransactionSigner::new(CHAIN_ID)
}

pub(crate) fn config() -> ExecutionConfig {
    ExecutionConfig {
        chain_id: CHAIN_ID,
        eip155_block: 0,
        gas_ceil: GAS_LIMIT,
    }
}

/// One ether.
pub(crate) fn ether() -> U256 {
    U256::exp10(18)
}

/// A chain whose genesis funds every account with one ether at nonce zero.
pub(crate) fn funded_chain(accounts: &[&TestAccount]) -> MemoryChain {
    MemoryChain::new(
        accounts
            .iter()
            .map(|account| (account.address, Account::with_balance(ether()))),
        GAS_LIMIT,
    )
}

pub(crate) fn backend(
    chain: &MemoryChain,
    pool: &Arc<MemoryPool>,
    config: ExecutionConfig,
) -> ExecutionBackend<MemoryChain, Arc<MemoryPool>> {
    ExecutionBackend::new(chain.clone(), pool.clone(), config)
}

pub(crate) fn empty_pool() -> Arc<MemoryPool> {
    Arc::new(MemoryPool::new(signer()))
}

pub(crate) fn attributes(timestamp: u64) -> PayloadAttributes {
    PayloadAttributes {
        timestamp,
        suggested_fee_recipient: Address::repeat_byte(0xfe),
        ..Default::default()
    }
}

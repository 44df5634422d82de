use std::sync::Arc;
use std::time::Duration;

use l2_driver::{Driver, DriverConfig, DriverError};
use l2_execution::mock::{Account, MemoryChain, MemoryPool};
use l2_execution::{address_of, BlockProducer, ExecutionBackend, ExecutionConfig, TransactionSigner};
use l2_rollup_interface::services::ChainStore;
use l2_rollup_interface::{Address, StepError, Transaction, U256};
use secp256k1::SecretKey;
use tokio_util::sync::CancellationToken;

use crate::helpers::*;

const CHAIN_ID: u64 = 901;

fn sequencing_driver(
    config: DriverConfig,
    pulls: Vec<Result<bool, StepError>>,
    steps: Vec<Result<(), StepError>>,
    cancel: &CancellationToken,
) -> Driver<ScriptedPipeline, ScriptedSequencer> {
    Driver::new(
        config,
        ScriptedPipeline::new(pulls)
            .with_recovery_point(42)
            .stop_when_exhausted(cancel),
        Some(ScriptedSequencer::new(ms(300), steps)),
    )
}

#[tokio::test(start_paused = true)]
async fn sequencer_steps_interleave_with_derivation() {
    initialize_logging();
    let cancel = CancellationToken::new();
    let mut driver = sequencing_driver(
        driver_config(u32::MAX),
        vec![Ok(true), Ok(true)],
        vec![],
        &cancel,
    );

    let err = driver.run(&cancel).await.unwrap_err();

    assert!(matches!(err, DriverError::Cancelled));
    let pulls: Vec<_> = driver.pipeline().calls().iter().map(|(at, _)| *at).collect();
    assert_eq!(pulls, vec![ms(0), ms(1_000), ms(2_000)]);
    assert_eq!(
        driver.sequencer().unwrap().calls(),
        &[ms(300), ms(600), ms(900), ms(1_300), ms(1_600), ms(1_900)]
    );
}

#[tokio::test(start_paused = true)]
async fn recoverable_sequencer_failure_recovers_derivation() {
    let cancel = CancellationToken::new();
    let mut driver = sequencing_driver(
        driver_config(u32::MAX),
        vec![Ok(true)],
        vec![Err(recoverable())],
        &cancel,
    );

    driver.run(&cancel).await.unwrap_err();

    assert_eq!(
        driver.pipeline().calls(),
        &[
            (ms(0), Call::Pull),
            (ms(300), Call::FindRecoveryPoint),
            (ms(300), Call::Recover(42)),
            (ms(1_300), Call::Pull),
        ]
    );
    assert_eq!(
        driver.sequencer().unwrap().calls(),
        &[ms(300), ms(600), ms(900), ms(1_200)]
    );
    assert_eq!(driver.sequencer_attempts(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn fatal_sequencer_failure_terminates_driver() {
    let cancel = CancellationToken::new();
    let mut driver = sequencing_driver(
        driver_config(u32::MAX),
        vec![Ok(true)],
        vec![Err(fatal())],
        &cancel,
    );

    let err = driver.run(&cancel).await.unwrap_err();

    assert!(matches!(err, DriverError::Sequencer(StepError::Fatal(_))));
    assert_eq!(driver.sequencer().unwrap().calls(), &[ms(300)]);
    assert!(!cancel.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn retryable_sequencer_failures_are_bounded() {
    let cancel = CancellationToken::new();
    let mut driver = sequencing_driver(
        driver_config(2),
        vec![Ok(true)],
        vec![Err(retryable()), Err(retryable())],
        &cancel,
    );

    let err = driver.run(&cancel).await.unwrap_err();

    assert!(matches!(err, DriverError::Sequencer(StepError::Retryable(_))));
    assert_eq!(driver.sequencer().unwrap().calls(), &[ms(300), ms(600)]);
    assert_eq!(driver.sequencer_attempts(), Some(2));
}

#[tokio::test]
async fn disabled_sequencing_ignores_sequencer() {
    let config = DriverConfig {
        sequencer_enabled: false,
        ..driver_config(u32::MAX)
    };
    let driver = sequencing_driver(config, vec![], vec![], &CancellationToken::new());

    assert!(driver.sequencer().is_none());
    assert_eq!(driver.sequencer_attempts(), None);
}

fn transfer(key: &SecretKey, nonce: u64) -> Transaction {
    let tx = Transaction {
        nonce,
        gas_price: U256::from(1_000_000_000u64),
        gas_limit: 21_000,
        to: Some(Address::repeat_byte(0xee)),
        value: U256::one(),
        ..Default::default()
    };
    TransactionSigner::new(CHAIN_ID).sign(tx, key).unwrap()
}

#[tokio::test(start_paused = true)]
async fn block_producer_seals_pool_transactions() {
    initialize_logging();
    let key = SecretKey::from_slice(&[1; 32]).unwrap();
    let chain = MemoryChain::new(
        [(address_of(&key), Account::with_balance(U256::exp10(18)))],
        30_000_000,
    );
    let pool = Arc::new(MemoryPool::new(TransactionSigner::new(CHAIN_ID)));
    let txs = vec![transfer(&key, 0), transfer(&key, 1)];
    for tx in &txs {
        pool.add(tx.clone()).unwrap();
    }
    let backend = ExecutionBackend::new(
        chain.clone(),
        pool,
        ExecutionConfig {
            chain_id: CHAIN_ID,
            eip155_block: 0,
            gas_ceil: 30_000_000,
        },
    );
    let producer = BlockProducer::new(backend, Address::repeat_byte(0xfe), Duration::from_secs(2));
    let cancel = CancellationToken::new();
    let pipeline = ScriptedPipeline::new([Ok(true), Ok(true)]).stop_when_exhausted(&cancel);
    let mut driver = Driver::new(driver_config(u32::MAX), pipeline, Some(producer));

    let err = driver.run(&cancel).await.unwrap_err();

    assert!(matches!(err, DriverError::Cancelled));
    let head = chain.block_by_hash(chain.head_hash()).unwrap();
    assert_eq!(head.number(), 1);
    assert_eq!(head.transactions, txs);
    assert_eq!(head.header.coinbase, Address::repeat_byte(0xfe));
}

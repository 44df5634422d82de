use l2_driver::{DerivationOp, Driver, DriverError};
use l2_rollup_interface::StepError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::helpers::*;

#[tokio::test(start_paused = true)]
async fn retryable_failures_exhaust_attempts_with_exponential_backoff() {
    initialize_logging();
    let pipeline = ScriptedPipeline::new((0..10).map(|_| Err(retryable())));
    let mut driver = Driver::derivation_only(driver_config(4), pipeline);
    let start = Instant::now();

    let err = driver.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, DriverError::Derivation(StepError::Retryable(_))));
    assert_eq!(start.elapsed(), ms(500 + 1_000 + 2_000));
    let pulls: Vec<_> = driver.pipeline().calls().iter().map(|(at, _)| *at).collect();
    assert_eq!(pulls, vec![ms(0), ms(500), ms(1_500), ms(3_500)]);
    assert_eq!(driver.derivation_attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn recoverable_failure_recovers_then_resumes_pulling() {
    initialize_logging();
    let cancel = CancellationToken::new();
    let pipeline = ScriptedPipeline::new([Err(recoverable()), Ok(true), Ok(true)])
        .with_recovery_point(100)
        .stop_when_exhausted(&cancel);
    let mut driver = Driver::derivation_only(driver_config(u32::MAX), pipeline);

    let err = driver.run(&cancel).await.unwrap_err();

    assert!(matches!(err, DriverError::Cancelled));
    assert_eq!(
        driver.pipeline().calls(),
        &[
            (ms(0), Call::Pull),
            (ms(0), Call::FindRecoveryPoint),
            (ms(0), Call::Recover(100)),
            (ms(1_000), Call::Pull),
            (ms(2_000), Call::Pull),
            (ms(3_000), Call::Pull),
        ]
    );
    assert_eq!(driver.derivation_attempts(), 0);
    assert_eq!(driver.derivation_op(), DerivationOp::Pull);
}

#[tokio::test(start_paused = true)]
async fn success_after_retries_resets_attempts() {
    let cancel = CancellationToken::new();
    let pipeline = ScriptedPipeline::new([Err(retryable()), Err(retryable()), Ok(true)])
        .stop_when_exhausted(&cancel);
    let mut driver = Driver::derivation_only(driver_config(3), pipeline);

    let err = driver.run(&cancel).await.unwrap_err();

    assert!(matches!(err, DriverError::Cancelled));
    let pulls: Vec<_> = driver.pipeline().calls().iter().map(|(at, _)| *at).collect();
    assert_eq!(pulls, vec![ms(0), ms(500), ms(1_500), ms(2_500)]);
    assert_eq!(driver.derivation_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn fatal_failure_terminates_immediately() {
    let pipeline = ScriptedPipeline::new([Err(fatal()), Ok(true)]);
    let mut driver = Driver::derivation_only(driver_config(u32::MAX), pipeline);

    let err = driver.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, DriverError::Derivation(StepError::Fatal(_))));
    assert_eq!(driver.pipeline().calls(), &[(ms(0), Call::Pull)]);
}

#[tokio::test(start_paused = true)]
async fn every_recoverable_failure_triggers_recovery() {
    let cancel = CancellationToken::new();
    let pipeline = ScriptedPipeline::new([Err(recoverable()), Err(recoverable())])
        .with_recovery_point(7)
        .stop_when_exhausted(&cancel);
    let mut driver = Driver::derivation_only(driver_config(u32::MAX), pipeline);

    driver.run(&cancel).await.unwrap_err();

    let recoveries = driver
        .pipeline()
        .calls()
        .iter()
        .filter(|(_, call)| *call == Call::Recover(7))
        .count();
    assert_eq!(recoveries, 2);
}

#[tokio::test]
async fn cancelled_driver_does_not_pull() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut driver = Driver::derivation_only(driver_config(u32::MAX), ScriptedPipeline::new([]));

    let err = driver.run(&cancel).await.unwrap_err();

    assert!(matches!(err, DriverError::Cancelled));
    assert!(driver.pipeline().calls().is_empty());
}

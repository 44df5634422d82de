use std::time::Duration;

use l2_metrics::update_metrics;
use l2_rollup_interface::services::{DerivationPipeline, Sequencer};
use l2_rollup_interface::StepError;
use l2_state_machine::{backoff, Operation, RetryConfig, RetryableStateFunction, StateMachine};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::DriverConfig;

/// Errors terminating the [`Driver`].
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Derivation failed in a way that cannot be retried or recovered.
    #[error("derivation failed: {0}")]
    Derivation(#[source] StepError),
    /// Sequencing failed in a way that cannot be retried or recovered.
    #[error("sequencer failed: {0}")]
    Sequencer(#[source] StepError),
    /// The driver was cancelled while waiting for work.
    #[error("driver cancelled")]
    Cancelled,
}

/// States the [`Driver`] moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStep {
    /// Wait until the derivation or the sequencer machine is ready.
    WaitForSignal,
    /// Invoke the derivation machine.
    Derive,
    /// Invoke the sequencer machine.
    Sequence,
    /// A derivation step succeeded; schedule the next pull.
    DerivationSucceeded,
    /// Switch the derivation machine to recovery.
    BeginRecovery,
    /// Recovery succeeded; switch the derivation machine back to pulling.
    RecoveryFinished,
}

/// The operation currently wrapped by the derivation machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationOp {
    /// Advance the pipeline by one step.
    Pull,
    /// Find a recovery point and reset the pipeline to it.
    Recover,
}

#[async_trait::async_trait]
impl<P: DerivationPipeline> Operation<P> for DerivationOp {
    type Error = StepError;

    async fn execute(&self, pipeline: &mut P, cancel: &CancellationToken) -> Result<(), StepError> {
        match self {
            Self::Pull => {
                let advanced = pipeline.pull(cancel).await?;
                trace!(advanced, "Derivation step finished");
                update_metrics(|metrics| metrics.derivation_steps.inc());
            }
            Self::Recover => {
                let recovery_point = pipeline.find_recovery_point(cancel).await?;
                warn!(%recovery_point, "Recovering derivation pipeline");
                pipeline.recover(cancel, recovery_point).await?;
                info!(%recovery_point, "Derivation pipeline recovered");
            }
        }
        Ok(())
    }
}

/// Runs one [`Sequencer::step`].
#[derive(Debug, Clone, Copy)]
pub struct SequencerStep;

#[async_trait::async_trait]
impl<S: Sequencer> Operation<S> for SequencerStep {
    type Error = StepError;

    async fn execute(&self, sequencer: &mut S, cancel: &CancellationToken) -> Result<(), StepError> {
        sequencer.step(cancel).await
    }
}

/// Placeholder sequencer of a node that only derives.
#[derive(Debug)]
pub enum NoSequencer {}

#[async_trait::async_trait]
impl Sequencer for NoSequencer {
    async fn step(&mut self, _cancel: &CancellationToken) -> Result<(), StepError> {
        match *self {}
    }

    fn plan(&self) -> Duration {
        match *self {}
    }
}

fn classify_derivation(attempt: u32, err: &StepError) -> Option<DriverStep> {
    match err {
        StepError::Retryable(_) => {
            trace!(attempt, %err, "Derivation step failed, retrying");
            update_metrics(|metrics| metrics.derivation_retries.inc());
            Some(DriverStep::WaitForSignal)
        }
        StepError::Recoverable(_) => {
            warn!(attempt, %err, "Derivation step requires recovery");
            Some(DriverStep::BeginRecovery)
        }
        StepError::Fatal(_) => None,
    }
}

fn classify_sequencer(attempt: u32, err: &StepError) -> Option<DriverStep> {
    match err {
        StepError::Retryable(_) => {
            trace!(attempt, %err, "Sequencer step failed, retrying");
            Some(DriverStep::WaitForSignal)
        }
        StepError::Recoverable(_) => {
            warn!(attempt, %err, "Sequencer step requires recovery of the derivation pipeline");
            Some(DriverStep::BeginRecovery)
        }
        StepError::Fatal(_) => None,
    }
}

struct SequencerSlot<S: Sequencer> {
    sequencer: S,
    machine: RetryableStateFunction<S, SequencerStep, DriverStep>,
}

/// Multiplexes the derivation pipeline and an optional sequencer onto one task.
///
/// Each cycle waits for whichever machine is ready first and runs exactly one
/// step of it, so at most one chain-mutating call is ever in flight.
pub struct Driver<P: DerivationPipeline, S: Sequencer = NoSequencer> {
    config: DriverConfig,
    pipeline: P,
    derivation: RetryableStateFunction<P, DerivationOp, DriverStep>,
    sequencer: Option<SequencerSlot<S>>,
}

impl<P: DerivationPipeline> Driver<P, NoSequencer> {
    /// Creates a driver without a sequencer.
    pub fn derivation_only(config: DriverConfig, pipeline: P) -> Self {
        Self::new(config, pipeline, None)
    }
}

impl<P: DerivationPipeline, S: Sequencer> Driver<P, S> {
    /// Creates a driver. `sequencer` is ignored unless the config enables sequencing.
    pub fn new(config: DriverConfig, pipeline: P, sequencer: Option<S>) -> Self {
        let derivation = RetryableStateFunction::new(
            RetryConfig::new(DerivationOp::Pull, DriverStep::WaitForSignal)
                .with_on_success(DriverStep::DerivationSucceeded)
                .with_on_error(classify_derivation)
                .with_delay(backoff::exponential(config.retry_delay()))
                .with_max_attempts(config.max_attempts),
        );

        let sequencer = match sequencer {
            Some(sequencer) if config.sequencer_enabled => Some(SequencerSlot {
                sequencer,
                machine: RetryableStateFunction::new(
                    RetryConfig::new(SequencerStep, DriverStep::WaitForSignal)
                        .with_on_success(DriverStep::WaitForSignal)
                        .with_on_error(classify_sequencer)
                        .with_max_attempts(config.max_attempts),
                ),
            }),
            Some(_) => {
                debug!("Sequencing is disabled, dropping sequencer");
                None
            }
            None => {
                if config.sequencer_enabled {
                    warn!("Sequencing is enabled but no sequencer was provided");
                }
                None
            }
        };

        Self {
            config,
            pipeline,
            derivation,
            sequencer,
        }
    }

    /// Runs the driver until it fails or `cancel` fires.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), DriverError> {
        info!(
            sequencer = self.sequencer.is_some(),
            step_interval = ?self.config.step_interval(),
            "Starting driver"
        );
        let result = l2_state_machine::run(self, DriverStep::WaitForSignal, cancel).await;
        match &result {
            Ok(()) => info!("Driver stopped"),
            Err(DriverError::Cancelled) => info!("Driver cancelled"),
            Err(err) => error!(%err, "Driver terminated"),
        }
        result
    }

    /// The derivation pipeline.
    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// The sequencer, if sequencing is enabled.
    pub fn sequencer(&self) -> Option<&S> {
        self.sequencer.as_ref().map(|slot| &slot.sequencer)
    }

    /// The operation the derivation machine currently wraps.
    pub fn derivation_op(&self) -> DerivationOp {
        self.derivation.config().operation
    }

    /// Consecutive derivation failures since the last success.
    pub fn derivation_attempts(&self) -> u32 {
        self.derivation.attempts()
    }

    /// Consecutive sequencer failures since the last success.
    pub fn sequencer_attempts(&self) -> Option<u32> {
        self.sequencer.as_ref().map(|slot| slot.machine.attempts())
    }

    async fn wait_for_signal(&mut self, cancel: &CancellationToken) -> Result<DriverStep, DriverError> {
        if let Some(slot) = &mut self.sequencer {
            let delay = slot.sequencer.plan();
            slot.machine.reset_delay(delay);
        }

        let derivation = &mut self.derivation;
        let sequencer = &mut self.sequencer;
        let sequencer_ready = async move {
            match sequencer {
                Some(slot) => slot.machine.ready().fired().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DriverError::Cancelled),
            _ = derivation.ready().fired() => Ok(DriverStep::Derive),
            _ = sequencer_ready => Ok(DriverStep::Sequence),
        }
    }

    fn begin_recovery(&mut self) {
        update_metrics(|metrics| metrics.recoveries.inc());
        self.derivation.reconfigure(|config| {
            config.operation = DerivationOp::Recover;
            config.on_success = Some(DriverStep::RecoveryFinished);
        });
        self.derivation.reset_delay(Duration::ZERO);
    }

    fn finish_recovery(&mut self) {
        self.derivation.reconfigure(|config| {
            config.operation = DerivationOp::Pull;
            config.on_success = Some(DriverStep::DerivationSucceeded);
        });
        self.derivation.reset_delay(self.config.step_interval());
    }
}

#[async_trait::async_trait]
impl<P: DerivationPipeline, S: Sequencer> StateMachine for Driver<P, S> {
    type State = DriverStep;
    type Error = DriverError;

    async fn transition(
        &mut self,
        state: DriverStep,
        cancel: &CancellationToken,
    ) -> Result<Option<DriverStep>, DriverError> {
        let next = match state {
            DriverStep::WaitForSignal => Some(self.wait_for_signal(cancel).await?),
            DriverStep::Derive => self
                .derivation
                .invoke(&mut self.pipeline, cancel)
                .await
                .map_err(DriverError::Derivation)?,
            DriverStep::Sequence => match &mut self.sequencer {
                Some(slot) => {
                    let next = slot
                        .machine
                        .invoke(&mut slot.sequencer, cancel)
                        .await
                        .map_err(DriverError::Sequencer)?;
                    if slot.machine.attempts() == 0 {
                        update_metrics(|metrics| metrics.sequencer_steps.inc());
                    }
                    next
                }
                None => Some(DriverStep::WaitForSignal),
            },
            DriverStep::DerivationSucceeded => {
                self.derivation.reset_delay(self.config.step_interval());
                Some(DriverStep::WaitForSignal)
            }
            DriverStep::BeginRecovery => {
                self.begin_recovery();
                Some(DriverStep::WaitForSignal)
            }
            DriverStep::RecoveryFinished => {
                self.finish_recovery();
                Some(DriverStep::WaitForSignal)
            }
        };
        Ok(next)
    }
}

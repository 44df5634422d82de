use std::collections::VecDeque;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use l2_driver::DriverConfig;
use l2_rollup_interface::services::{DerivationPipeline, Sequencer};
use l2_rollup_interface::{BlockId, StepError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub fn initialize_logging() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(
            EnvFilter::from_str(&env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
                .unwrap(),
        )
        .try_init();
}

pub fn driver_config(max_attempts: u32) -> DriverConfig {
    DriverConfig {
        step_interval_ms: 1_000,
        retry_delay_ms: 250,
        max_attempts,
        sequencer_enabled: true,
    }
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub fn retryable() -> StepError {
    StepError::retryable(anyhow::anyhow!("connection reset"))
}

pub fn recoverable() -> StepError {
    StepError::recoverable(anyhow::anyhow!("unsafe head does not extend local chain"))
}

pub fn fatal() -> StepError {
    StepError::Fatal(anyhow::anyhow!("corrupted batch"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Pull,
    FindRecoveryPoint,
    Recover(u64),
}

/// Plays back scripted results and records when each method was called.
///
/// Once the pull script is exhausted, pulls succeed and, if a stop token was
/// given, cancel it.
pub struct ScriptedPipeline {
    pulls: VecDeque<Result<bool, StepError>>,
    recovery_point: BlockId,
    stop: Option<CancellationToken>,
    started: Instant,
    calls: Vec<(Duration, Call)>,
}

impl ScriptedPipeline {
    pub fn new(pulls: impl IntoIterator<Item = Result<bool, StepError>>) -> Self {
        Self {
            pulls: pulls.into_iter().collect(),
            recovery_point: BlockId::default(),
            stop: None,
            started: Instant::now(),
            calls: Vec::new(),
        }
    }

    pub fn with_recovery_point(mut self, number: u64) -> Self {
        self.recovery_point.number = number;
        self
    }

    pub fn stop_when_exhausted(mut self, stop: &CancellationToken) -> Self {
        self.stop = Some(stop.clone());
        self
    }

    pub fn calls(&self) -> &[(Duration, Call)] {
        &self.calls
    }

    fn record(&mut self, call: Call) {
        self.calls.push((self.started.elapsed(), call));
    }
}

#[async_trait::async_trait]
impl DerivationPipeline for ScriptedPipeline {
    async fn pull(&mut self, _cancel: &CancellationToken) -> Result<bool, StepError> {
        self.record(Call::Pull);
        match self.pulls.pop_front() {
            Some(result) => result,
            None => {
                if let Some(stop) = &self.stop {
                    stop.cancel();
                }
                Ok(false)
            }
        }
    }

    async fn find_recovery_point(
        &mut self,
        _cancel: &CancellationToken,
    ) -> Result<BlockId, StepError> {
        self.record(Call::FindRecoveryPoint);
        Ok(self.recovery_point)
    }

    async fn recover(
        &mut self,
        _cancel: &CancellationToken,
        recovery_point: BlockId,
    ) -> Result<(), StepError> {
        self.record(Call::Recover(recovery_point.number));
        Ok(())
    }
}

/// A sequencer asking to step every `interval`, playing back scripted results.
pub struct ScriptedSequencer {
    interval: Duration,
    steps: VecDeque<Result<(), StepError>>,
    started: Instant,
    calls: Vec<Duration>,
}

impl ScriptedSequencer {
    pub fn new(interval: Duration, steps: impl IntoIterator<Item = Result<(), StepError>>) -> Self {
        Self {
            interval,
            steps: steps.into_iter().collect(),
            started: Instant::now(),
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[Duration] {
        &self.calls
    }
}

#[async_trait::async_trait]
impl Sequencer for ScriptedSequencer {
    async fn step(&mut self, _cancel: &CancellationToken) -> Result<(), StepError> {
        self.calls.push(self.started.elapsed());
        self.steps.pop_front().unwrap_or(Ok(()))
    }

    fn plan(&self) -> Duration {
        self.interval
    }
}

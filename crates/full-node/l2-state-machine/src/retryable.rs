use std::marker::PhantomData;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{backoff, ReadySignal};

/// Decides the next state after the `attempt`-th consecutive failure.
///
/// Returning `None` gives up and surfaces the error.
pub type ErrorHandler<N, E> = Box<dyn Fn(u32, &E) -> Option<N> + Send + Sync>;

/// Maps the consecutive failure count to the delay before the next attempt.
pub type DelayFn = Box<dyn Fn(u32) -> Duration + Send + Sync>;

/// A fallible unit of work performed against a target owned by the caller.
#[async_trait::async_trait]
pub trait Operation<T: Send + ?Sized>: Send + Sync {
    /// Error reported when the operation fails.
    type Error: Send;

    /// Performs the operation once.
    async fn execute(&self, target: &mut T, cancel: &CancellationToken) -> Result<(), Self::Error>;
}

/// Everything a [`RetryableStateFunction`] can be (re)configured with.
pub struct RetryConfig<O, N, E> {
    /// The operation invoked on every attempt.
    pub operation: O,
    /// State returned after a successful attempt; `None` ends the machine.
    pub on_success: Option<N>,
    /// Classifies failures into a next state, or gives up.
    pub on_error: ErrorHandler<N, E>,
    /// Backoff schedule applied after each failure.
    pub delay: DelayFn,
    /// Consecutive failures after which the error is surfaced regardless of the classifier.
    pub max_attempts: u32,
}

impl<O, N, E> RetryConfig<O, N, E>
where
    N: Clone + Send + Sync + 'static,
{
    /// A single-shot configuration: on success the machine ends, every failure
    /// is retried by returning `retry` immediately, with no bound on attempts.
    pub fn new(operation: O, retry: N) -> Self {
        Self {
            operation,
            on_success: None,
            on_error: Box::new(move |_, _| Some(retry.clone())),
            delay: backoff::none(),
            max_attempts: u32::MAX,
        }
    }
}

impl<O, N, E> RetryConfig<O, N, E> {
    /// Sets the state returned after a successful attempt.
    pub fn with_on_success(mut self, next: N) -> Self {
        self.on_success = Some(next);
        self
    }

    /// Sets the failure classifier.
    pub fn with_on_error(
        mut self,
        on_error: impl Fn(u32, &E) -> Option<N> + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Box::new(on_error);
        self
    }

    /// Sets the backoff schedule.
    pub fn with_delay(mut self, delay: DelayFn) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the attempt bound.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Wraps an [`Operation`] with failure classification, bounded attempts and backoff.
///
/// The machine owns a [`ReadySignal`] that starts armed with no delay. After a
/// classified failure the signal is re-armed with the backoff delay for the
/// current attempt count; after a success the count goes back to zero.
pub struct RetryableStateFunction<T: Send + ?Sized, O: Operation<T>, N> {
    config: RetryConfig<O, N, O::Error>,
    attempts: u32,
    ready: ReadySignal,
    _target: PhantomData<fn(&mut T)>,
}

impl<T, O, N> RetryableStateFunction<T, O, N>
where
    T: Send + ?Sized,
    O: Operation<T>,
    N: Clone + Send,
{
    /// Creates the machine with its signal armed for an immediate first attempt.
    pub fn new(config: RetryConfig<O, N, O::Error>) -> Self {
        Self {
            config,
            attempts: 0,
            ready: ReadySignal::immediate(),
            _target: PhantomData,
        }
    }

    /// Invokes the operation once against `target`.
    ///
    /// On success the attempt counter resets and the success state is returned.
    /// On failure the counter increments. Once it reaches the attempt bound the
    /// error is returned without consulting the classifier. Otherwise the
    /// classifier picks the next state, or declines and the error is returned,
    /// and the ready signal is re-armed with the backoff delay.
    pub async fn invoke(
        &mut self,
        target: &mut T,
        cancel: &CancellationToken,
    ) -> Result<Option<N>, O::Error> {
        match self.config.operation.execute(target, cancel).await {
            Ok(()) => {
                self.attempts = 0;
                Ok(self.config.on_success.clone())
            }
            Err(err) => {
                self.attempts = self.attempts.saturating_add(1);
                if self.attempts >= self.config.max_attempts {
                    debug!(attempts = self.attempts, "Attempt bound reached, giving up");
                    return Err(err);
                }
                match (self.config.on_error)(self.attempts, &err) {
                    Some(next) => {
                        let delay = (self.config.delay)(self.attempts);
                        trace!(attempts = self.attempts, ?delay, "Scheduling retry");
                        self.ready.reset(delay);
                        Ok(Some(next))
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// Applies a set of configuration overrides in one step.
    pub fn reconfigure(&mut self, update: impl FnOnce(&mut RetryConfig<O, N, O::Error>)) {
        update(&mut self.config);
    }

    /// Arms the ready signal to fire after `delay`, replacing any pending firing.
    pub fn reset_delay(&mut self, delay: Duration) {
        self.ready.reset(delay);
    }

    /// The signal the owner waits on before calling [`Self::invoke`].
    pub fn ready(&mut self) -> &mut ReadySignal {
        &mut self.ready
    }

    /// Consecutive failures since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The current configuration.
    pub fn config(&self) -> &RetryConfig<O, N, O::Error> {
        &self.config
    }
}

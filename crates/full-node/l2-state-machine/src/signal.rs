use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// Upper bound on how far in the future a signal can be armed.
pub(crate) const MAX_DELAY: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// A one-shot timer that tells the owner of a machine when to invoke it.
///
/// Re-arming replaces any pending deadline, so at most one firing is ever
/// outstanding. A disarmed signal never fires.
#[derive(Debug)]
pub struct ReadySignal {
    timer: Pin<Box<Sleep>>,
    armed: bool,
}

impl ReadySignal {
    /// Creates a signal that fires as soon as it is awaited.
    pub fn immediate() -> Self {
        Self {
            timer: Box::pin(tokio::time::sleep(Duration::ZERO)),
            armed: true,
        }
    }

    /// Arms the signal to fire after `delay`, replacing any pending deadline.
    pub fn reset(&mut self, delay: Duration) {
        self.timer
            .as_mut()
            .reset(Instant::now() + delay.min(MAX_DELAY));
        self.armed = true;
    }

    /// Whether a firing is outstanding.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Deadline of the outstanding firing, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.armed.then(|| self.timer.deadline())
    }

    /// Completes when the signal fires and disarms it.
    ///
    /// Pends forever while disarmed. Cancel-safe: dropping the future before
    /// it completes leaves the signal armed.
    pub async fn fired(&mut self) {
        if !self.armed {
            return std::future::pending().await;
        }
        self.timer.as_mut().await;
        self.armed = false;
    }
}

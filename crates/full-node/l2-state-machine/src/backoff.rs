//! Delay schedules for [`crate::RetryableStateFunction`].

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

use crate::signal::MAX_DELAY;
use crate::DelayFn;

/// Past this many doublings even a one-nanosecond base has reached [`MAX_DELAY`].
const MAX_DOUBLINGS: u32 = 64;

/// No delay between attempts.
pub fn none() -> DelayFn {
    Box::new(|_| Duration::ZERO)
}

/// `base * 2^attempt`, capped at the longest delay a [`crate::ReadySignal`] can be armed with.
pub fn exponential(base: Duration) -> DelayFn {
    let policy = ExponentialBuilder::default()
        .with_min_delay(base.min(MAX_DELAY))
        .with_max_delay(MAX_DELAY)
        .with_factor(2.0)
        .with_max_times(usize::MAX);
    Box::new(move |attempt| {
        policy
            .build()
            .nth(attempt.min(MAX_DOUBLINGS) as usize)
            .unwrap_or(MAX_DELAY)
    })
}

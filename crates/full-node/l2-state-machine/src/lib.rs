//! Step-function runtime for the L2 node.
//!
//! A [`StateMachine`] interprets one state at a time and returns the state to
//! interpret next; [`run`] trampolines it until no state is left or an error
//! occurs. [`RetryableStateFunction`] wraps a fallible [`Operation`] with an
//! error classifier, a backoff schedule and a [`ReadySignal`] telling its
//! owner when to invoke it again.

#![deny(missing_docs)]

pub mod backoff;
mod retryable;
mod runtime;
mod signal;

pub use retryable::{DelayFn, ErrorHandler, Operation, RetryConfig, RetryableStateFunction};
pub use runtime::{run, StateMachine};
pub use signal::ReadySignal;

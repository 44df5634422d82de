//! Interfaces of the collaborators the node core is driven against.

mod chain;
mod derivation;
mod sequencer;

pub use chain::*;
pub use derivation::*;
pub use sequencer::*;

//! In-memory chain, state and transaction pool for tests and local development.

mod chain;
mod pool;
mod state;

pub use chain::MemoryChain;
pub use pool::MemoryPool;
pub use state::{Account, MemoryState};

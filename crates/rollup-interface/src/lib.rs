//! This crate defines the core types and traits shared by the L2 node.
//! It specifies the chain primitives exchanged with the execution layer, the error
//! taxonomy every driven operation reports, and the interfaces of the collaborators
//! (derivation pipeline, sequencer, chain store, state database, transaction pool)
//! which the driver and the execution backend are written against.

#![deny(missing_docs)]

mod attributes;
mod block;
mod error;
mod hash;
pub mod services;
mod transaction;

pub use attributes::*;
pub use block::*;
pub use error::*;
pub use ethereum_types::{Address, H256, U256};
pub use hash::{keccak256, ordered_commitment};
pub use transaction::*;
pub use {anyhow, rlp};

#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

mod config;
mod driver;
mod service;

pub use config::{from_toml_path, DriverConfig, RollupConfig};
pub use driver::{DerivationOp, Driver, DriverError, DriverStep, NoSequencer, SequencerStep};
pub use service::{NodeService, TaskGroup};

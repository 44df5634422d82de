use ethereum_types::Address;
use serde::{Deserialize, Serialize};

/// Parameters for building a new block on top of the current head.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadAttributes {
    /// Timestamp of the new block.
    pub timestamp: u64,
    /// Recipient of the block's fees.
    pub suggested_fee_recipient: Address,
    /// RLP encoded transactions that must be included first, in order.
    #[serde(default)]
    pub transactions: Vec<Vec<u8>>,
    /// When set, only the forced transactions are included.
    #[serde(default)]
    pub no_tx_pool: bool,
}

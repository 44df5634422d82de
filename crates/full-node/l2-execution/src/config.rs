use schemars::JsonSchema;
use serde::Deserialize;

/// Configuration of the execution backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct ExecutionConfig {
    /// Chain id replay-protected transactions must commit to.
    pub chain_id: u64,
    /// First block at which replay-protected transactions are accepted.
    #[serde(default)]
    pub eip155_block: u64,
    /// Gas limit that built blocks converge towards.
    pub gas_ceil: u64,
}

impl ExecutionConfig {
    /// Whether replay-protected transactions may be included in block `number`.
    pub fn is_eip155(&self, number: u64) -> bool {
        number >= self.eip155_block
    }
}

use std::fmt;

use ethereum_types::{Address, H256, U256};
use rlp::{Encodable, RlpStream};
use serde::{Deserialize, Serialize};

use crate::{keccak256, Transaction};

/// A `(number, hash)` pair identifying a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId {
    /// Height of the block.
    pub number: u64,
    /// Hash of the block header.
    pub hash: H256,
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({:?})", self.number, self.hash)
    }
}

/// The three fork-choice pointers requested by the consensus side.
///
/// A zero hash means "not provided" for `safe_hash` and `finalized_hash`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkchoiceState {
    /// Hash of the block that should become the canonical head.
    pub head_hash: H256,
    /// Hash of the block that should be marked safe.
    pub safe_hash: H256,
    /// Hash of the block that should be marked finalized.
    pub finalized_hash: H256,
}

/// Verdict of a payload or fork-choice request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PayloadValidity {
    /// The request was accepted.
    Valid,
    /// The request was rejected.
    Invalid,
}

/// Outcome of a fork-choice update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadStatus {
    /// Whether the request was accepted.
    pub status: PayloadValidity,
    /// Hash of the most recent valid block, when known.
    pub latest_valid_hash: Option<H256>,
}

impl PayloadStatus {
    /// A `VALID` status pointing at `latest_valid_hash`.
    pub fn valid(latest_valid_hash: H256) -> Self {
        Self {
            status: PayloadValidity::Valid,
            latest_valid_hash: Some(latest_valid_hash),
        }
    }

    /// An `INVALID` status, optionally carrying the last valid hash.
    pub fn invalid(latest_valid_hash: Option<H256>) -> Self {
        Self {
            status: PayloadValidity::Invalid,
            latest_valid_hash,
        }
    }

    /// Returns `true` if the status is `VALID`.
    pub fn is_valid(&self) -> bool {
        self.status == PayloadValidity::Valid
    }
}

/// Hash of the RLP encoding of an empty uncle list.
pub fn empty_uncle_hash() -> H256 {
    keccak256(rlp::EMPTY_LIST_RLP)
}

/// A block header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Hash of the parent header.
    pub parent_hash: H256,
    /// Hash of the uncle list.
    pub uncle_hash: H256,
    /// Recipient of the block's fees.
    pub coinbase: Address,
    /// State root after executing the block.
    pub state_root: H256,
    /// Commitment to the block's transactions.
    pub transactions_root: H256,
    /// Commitment to the block's receipts.
    pub receipts_root: H256,
    /// Difficulty placeholder.
    pub difficulty: U256,
    /// Height of the block.
    pub number: u64,
    /// Gas limit of the block.
    pub gas_limit: u64,
    /// Gas consumed by the block's transactions.
    pub gas_used: u64,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Arbitrary extra data.
    pub extra_data: Vec<u8>,
}

impl Header {
    /// Keccak hash of the RLP encoded header.
    pub fn hash(&self) -> H256 {
        keccak256(rlp::encode(self))
    }

    /// The `(number, hash)` of this header.
    pub fn id(&self) -> BlockId {
        BlockId {
            number: self.number,
            hash: self.hash(),
        }
    }
}

impl Encodable for Header {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(12);
        s.append(&self.parent_hash);
        s.append(&self.uncle_hash);
        s.append(&self.coinbase);
        s.append(&self.state_root);
        s.append(&self.transactions_root);
        s.append(&self.receipts_root);
        s.append(&self.difficulty);
        s.append(&self.number);
        s.append(&self.gas_limit);
        s.append(&self.gas_used);
        s.append(&self.timestamp);
        s.append(&self.extra_data);
    }
}

/// A block: a header plus its ordered transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    /// The block header.
    pub header: Header,
    /// Transactions in execution order.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Hash of the block header.
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    /// Height of the block.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// The `(number, hash)` of this block.
    pub fn id(&self) -> BlockId {
        self.header.id()
    }
}

/// An event emitted during transaction execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Log {
    /// Emitting account.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<H256>,
    /// Unindexed payload.
    pub data: Vec<u8>,
    /// Height of the including block.
    pub block_number: u64,
    /// Hash of the including block.
    pub block_hash: H256,
    /// Hash of the emitting transaction.
    pub transaction_hash: H256,
    /// Position of the emitting transaction in the block.
    pub transaction_index: u64,
    /// Position of the log in the block.
    pub log_index: u64,
}

impl Encodable for Log {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.address);
        s.begin_list(self.topics.len());
        for topic in &self.topics {
            s.append(topic);
        }
        s.append(&self.data);
    }
}

/// The result of executing a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    /// Whether execution succeeded.
    pub success: bool,
    /// Gas used by this and all preceding transactions of the block.
    pub cumulative_gas_used: u64,
    /// Gas used by this transaction alone.
    pub gas_used: u64,
    /// Logs emitted by the transaction.
    pub logs: Vec<Log>,
    /// Hash of the transaction.
    pub transaction_hash: H256,
    /// Position of the transaction in the block.
    pub transaction_index: u64,
    /// Height of the including block.
    pub block_number: u64,
    /// Hash of the including block.
    pub block_hash: H256,
}

impl Encodable for Receipt {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.success);
        s.append(&self.cumulative_gas_used);
        s.begin_list(self.logs.len());
        for log in &self.logs {
            s.append(log);
        }
    }
}

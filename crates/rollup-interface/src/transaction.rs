use ethereum_types::{Address, H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

use crate::keccak256;

/// Gas charged for every transaction before execution.
pub const TX_GAS: u64 = 21_000;

/// Gas charged for every contract creation before execution.
pub const TX_GAS_CONTRACT_CREATION: u64 = 53_000;

/// ECDSA signature values of a legacy transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signature {
    /// Recovery value; encodes the chain id for replay-protected transactions.
    pub v: u64,
    /// `r` component.
    pub r: U256,
    /// `s` component.
    pub s: U256,
}

/// A signed legacy transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    /// Sender nonce.
    pub nonce: u64,
    /// Price paid per unit of gas.
    pub gas_price: U256,
    /// Maximum gas the transaction may use.
    pub gas_limit: u64,
    /// Recipient, or `None` for a contract creation.
    pub to: Option<Address>,
    /// Transferred value.
    pub value: U256,
    /// Call data or init code.
    pub data: Vec<u8>,
    /// Signature over the signing hash.
    pub signature: Signature,
}

impl Transaction {
    /// Keccak hash of the RLP encoded transaction.
    pub fn hash(&self) -> H256 {
        keccak256(rlp::encode(self))
    }

    /// Returns `true` if the signature commits to a chain id.
    pub fn is_protected(&self) -> bool {
        !matches!(self.signature.v, 27 | 28)
    }

    /// The chain id committed to by the signature, if any.
    pub fn chain_id(&self) -> Option<u64> {
        match self.signature.v {
            v if v >= 35 => Some((v - 35) / 2),
            _ => None,
        }
    }

    /// Price used for ordering; legacy transactions pay exactly their gas price.
    pub fn effective_gas_price(&self) -> U256 {
        self.gas_price
    }

    /// Gas charged before any execution takes place.
    pub fn intrinsic_gas(&self) -> u64 {
        let base = if self.to.is_some() {
            TX_GAS
        } else {
            TX_GAS_CONTRACT_CREATION
        };
        self.data.iter().fold(base, |gas, byte| {
            gas.saturating_add(if *byte == 0 { 4 } else { 16 })
        })
    }

    /// Hash signed by the sender. With a chain id the EIP-155 form is used.
    pub fn signing_hash(&self, chain_id: Option<u64>) -> H256 {
        let mut stream = RlpStream::new_list(if chain_id.is_some() { 9 } else { 6 });
        self.append_unsigned_fields(&mut stream);
        if let Some(chain_id) = chain_id {
            stream.append(&chain_id);
            stream.append(&0u8);
            stream.append(&0u8);
        }
        keccak256(stream.out())
    }

    /// RLP encoding of the signed transaction.
    pub fn encode(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }

    /// Decodes a signed transaction from its RLP encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecoderError> {
        rlp::decode(bytes)
    }

    fn append_unsigned_fields(&self, s: &mut RlpStream) {
        s.append(&self.nonce);
        s.append(&self.gas_price);
        s.append(&self.gas_limit);
        match &self.to {
            Some(to) => s.append(to),
            None => s.append_empty_data(),
        };
        s.append(&self.value);
        s.append(&self.data);
    }
}

impl Encodable for Transaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(9);
        self.append_unsigned_fields(s);
        s.append(&self.signature.v);
        s.append(&self.signature.r);
        s.append(&self.signature.s);
    }
}

impl Decodable for Transaction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 9 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let to = {
            let item = rlp.at(3)?;
            if item.is_empty() {
                None
            } else {
                Some(item.as_val()?)
            }
        };
        Ok(Self {
            nonce: rlp.val_at(0)?,
            gas_price: rlp.val_at(1)?,
            gas_limit: rlp.val_at(2)?,
            to,
            value: rlp.val_at(4)?,
            data: rlp.val_at(5)?,
            signature: Signature {
                v: rlp.val_at(6)?,
                r: rlp.val_at(7)?,
                s: rlp.val_at(8)?,
            },
        })
    }
}

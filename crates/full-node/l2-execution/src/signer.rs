use l2_rollup_interface::{keccak256, Address, Signature, Transaction, U256};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};

/// Errors raised while signing transactions or recovering their sender.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// A replay-protected transaction committed to another chain.
    #[error("invalid chain id for signer: have {have} want {want}")]
    ChainIdMismatch {
        /// Chain id committed to by the transaction.
        have: u64,
        /// Chain id of the signer.
        want: u64,
    },
    /// The `v` value encodes neither a legacy nor an EIP-155 signature.
    #[error("invalid signature recovery value {0}")]
    InvalidV(u64),
    /// The chain id is too large to be encoded in an EIP-155 `v` value.
    #[error("chain id {0} does not fit an EIP-155 signature")]
    ChainIdTooLarge(u64),
    /// The signature does not recover to a public key.
    #[error("invalid signature: {0}")]
    Secp256k1(#[from] secp256k1::Error),
}

/// Signs legacy transactions and recovers their sender, EIP-155 aware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionSigner {
    chain_id: u64,
}

impl TransactionSigner {
    /// Creates a signer for `chain_id`.
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    /// The chain id protected transactions are signed for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Recovers the address that signed `tx`.
    pub fn sender(&self, tx: &Transaction) -> Result<Address, SignerError> {
        let (chain_id, parity) = match tx.signature.v {
            v @ (27 | 28) => (None, v - 27),
            v if v >= 35 => {
                let chain_id = (v - 35) / 2;
                if chain_id != self.chain_id {
                    return Err(SignerError::ChainIdMismatch {
                        have: chain_id,
                        want: self.chain_id,
                    });
                }
                (Some(chain_id), (v - 35) % 2)
            }
            v => return Err(SignerError::InvalidV(v)),
        };

        let mut compact = [0u8; 64];
        tx.signature.r.to_big_endian(&mut compact[..32]);
        tx.signature.s.to_big_endian(&mut compact[32..]);
        let recovery_id = RecoveryId::from_i32(if parity == 0 { 0 } else { 1 })?;
        let signature = RecoverableSignature::from_compact(&compact, recovery_id)?;

        let message = Message::from_slice(tx.signing_hash(chain_id).as_bytes())?;
        let public_key = SECP256K1.recover_ecdsa(&message, &signature)?;
        Ok(public_key_to_address(&public_key))
    }

    /// Signs `tx` with replay protection for this signer's chain.
    pub fn sign(&self, tx: Transaction, key: &SecretKey) -> Result<Transaction, SignerError> {
        sign_with(tx, key, Some(self.chain_id))
    }

    /// Signs `tx` without replay protection.
    pub fn sign_unprotected(
        &self,
        tx: Transaction,
        key: &SecretKey,
    ) -> Result<Transaction, SignerError> {
        sign_with(tx, key, None)
    }
}

fn sign_with(
    mut tx: Transaction,
    key: &SecretKey,
    chain_id: Option<u64>,
) -> Result<Transaction, SignerError> {
    let message = Message::from_slice(tx.signing_hash(chain_id).as_bytes())?;
    let (recovery_id, compact) = SECP256K1
        .sign_ecdsa_recoverable(&message, key)
        .serialize_compact();
    let parity = u64::from(recovery_id.to_i32().unsigned_abs());

    let v = match chain_id {
        Some(chain_id) => chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35 + parity))
            .ok_or(SignerError::ChainIdTooLarge(chain_id))?,
        None => 27 + parity,
    };
    tx.signature = Signature {
        v,
        r: U256::from_big_endian(&compact[..32]),
        s: U256::from_big_endian(&compact[32..]),
    };
    Ok(tx)
}

fn public_key_to_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    Address::from_slice(&keccak256(&uncompressed[1..]).as_bytes()[12..])
}

/// Address controlled by `key`.
pub fn address_of(key: &SecretKey) -> Address {
    public_key_to_address(&PublicKey::from_secret_key(SECP256K1, key))
}

use ethereum_types::H256;
use rlp::{Encodable, RlpStream};
use tiny_keccak::{Hasher, Keccak};

/// Computes the keccak-256 digest of `data`.
pub fn keccak256(data: impl AsRef<[u8]>) -> H256 {
    let mut hasher = Keccak::v256();
    hasher.update(data.as_ref());
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    H256(output)
}

/// Commits to an ordered list of items by hashing their RLP list encoding.
///
/// Used for the transactions and receipts roots of locally built headers.
pub fn ordered_commitment<T: Encodable>(items: &[T]) -> H256 {
    let mut stream = RlpStream::new_list(items.len());
    for item in items {
        stream.append(item);
    }
    keccak256(stream.out())
}

// Consensus-critical. Changes to encodings invalidate every stored root.
//! Canonical serialization and hashing helpers.
//!
//! Rule: stored and transmitted objects are encoded with Borsh. Hash inputs
//! are sequences of 32-byte field elements behind a domain separator.

use crate::constants::*;
use crate::types::{CoreError, Hash32};
use borsh::to_vec;

/// Encode a value with canonical Borsh encoding.
pub fn to_bytes<T: borsh::BorshSerialize>(v: &T) -> Result<Vec<u8>, CoreError> {
    to_vec(v).map_err(|_| CoreError::InvalidValue("borsh serialization failed"))
}

/// Decode a value from canonical Borsh encoding.
pub fn from_bytes<T: borsh::BorshDeserialize>(bytes: &[u8]) -> Result<T, CoreError> {
    T::try_from_slice(bytes).map_err(|_| CoreError::InvalidValue("borsh deserialization failed"))
}

/// Hash bytes with blake3 and return 32 bytes.
pub fn hash32(domain_sep: &[u8], bytes: &[u8]) -> Hash32 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain_sep);
    hasher.update(bytes);
    let out = hasher.finalize();
    let mut arr = [0u8; HASH32_LEN];
    arr.copy_from_slice(out.as_bytes());
    Hash32(arr)
}

/// Hash a sequence of field elements: `BLAKE3(domain || f_0 || ... || f_n)`.
pub fn hash_fields(domain_sep: &[u8], fields: &[[u8; HASH32_LEN]]) -> Hash32 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain_sep);
    for f in fields {
        hasher.update(f);
    }
    Hash32(*hasher.finalize().as_bytes())
}

/// Merkle inner node hash.
pub fn merkle_node(left: &Hash32, right: &Hash32) -> Hash32 {
    hash_fields(DS_MERKLE_NODE, &[left.0, right.0])
}

/// Empty-subtree hashes for every level `0..=levels`.
///
/// `empty[0]` is the empty leaf (zero); `empty[i + 1] = node(empty[i], empty[i])`.
pub fn empty_hashes(levels: usize) -> Vec<Hash32> {
    let mut out = Vec::with_capacity(levels + 1);
    let mut cur = Hash32::zero();
    out.push(cur);
    for _ in 0..levels {
        cur = merkle_node(&cur, &cur);
        out.push(cur);
    }
    out
}

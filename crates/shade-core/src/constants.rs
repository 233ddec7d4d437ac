//! Protocol-wide constants for the Shade ledger.

/// Length in bytes of a 32-byte hash (and of an encoded field element).
pub const HASH32_LEN: usize = 32;

/// Length in bytes of a SEC1 compressed secp256k1 point.
pub const POINT_LEN: usize = 33;

/// Length in bytes of a compact ECDSA signature (`r || s`).
pub const SIGNATURE_LEN: usize = 64;

/// Height of the account and UTXO trees.
///
/// A witness for a tree of height `h` carries `h - 1` path nodes.
pub const TREE_HEIGHT: usize = 32;

/// Number of levels of the sparse nullifier map (one per key bit).
pub const NULLIFIER_MAP_LEVELS: usize = 256;

/// Domain separator for account leaf commitments.
pub const DS_ACCOUNT_LEAF: &[u8] = b"SHADE::ACCOUNT_LEAF::V0";

/// Domain separator for UTXO leaf commitments.
pub const DS_UTXO_LEAF: &[u8] = b"SHADE::UTXO_LEAF::V0";

/// Domain separator for nullifier map keys.
pub const DS_NULLIFIER_KEY: &[u8] = b"SHADE::NULLIFIER_KEY::V0";

/// Domain separator for Merkle inner nodes.
pub const DS_MERKLE_NODE: &[u8] = b"SHADE::MERKLE_NODE::V0";

/// Domain separator for signed messages.
pub const DS_SIG_MSG: &[u8] = b"SHADE::SIG_MSG::V0";

/// Domain separation tag for hashing a nullifier message onto the curve.
pub const DS_NULLIFIER_H2C: &[u8] = b"SHADE::NULLIFIER_H2C::V0";

/// Domain separator for the nullifier proof challenge.
pub const DS_NULLIFIER_CHALLENGE: &[u8] = b"SHADE::NULLIFIER_CHALLENGE::V0";

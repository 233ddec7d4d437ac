//! Merkle witnesses and leaf positions.
//!
//! A witness is the ordered list of `(sibling, is_left)` pairs from the leaf up
//! to the root. `is_left` says the running node is the LEFT child at that
//! level, so the position bit for the level is 0.

use borsh::{BorshDeserialize, BorshSerialize};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::HASH32_LEN;
use crate::types::{CoreError, Hash32};

/// Number of bits a [`Position`] can address.
pub const POSITION_BITS: usize = HASH32_LEN * 8;

/// Leaf position as a 256-bit little-endian bit string.
///
/// Tree slots use the low bits; nullifier keys use all 256.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[derive(BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position(pub [u8; HASH32_LEN]);

impl Position {
    /// Position of a numbered slot.
    pub fn from_index(index: u64) -> Self {
        Self(Hash32::from_u64(index).0)
    }

    /// Position addressed by a map key.
    pub fn from_key(key: &Hash32) -> Self {
        Self(key.0)
    }

    /// Bit `i` (0 = leaf level).
    pub fn bit(&self, i: usize) -> bool {
        (self.0[i / 8] >> (i % 8)) & 1 == 1
    }

    /// Set bit `i`.
    pub fn set_bit(&mut self, i: usize, v: bool) {
        if v {
            self.0[i / 8] |= 1 << (i % 8);
        } else {
            self.0[i / 8] &= !(1 << (i % 8));
        }
    }

    /// Position of the parent node (shift right by one bit).
    pub fn parent(&self) -> Self {
        let mut out = [0u8; HASH32_LEN];
        for (i, byte) in out.iter_mut().enumerate() {
            let hi = self.0.get(i + 1).copied().unwrap_or(0);
            *byte = (self.0[i] >> 1) | (hi << 7);
        }
        Self(out)
    }

    /// Whether this node is the left child of its parent.
    pub fn is_left(&self) -> bool {
        !self.bit(0)
    }

    /// Position of the sibling node on the same level.
    pub fn sibling(&self) -> Self {
        let mut out = *self;
        out.0[0] ^= 1;
        out
    }

    /// Whether every bit at or above `levels` is zero.
    pub fn fits(&self, levels: usize) -> bool {
        (levels..POSITION_BITS).all(|i| !self.bit(i))
    }

    /// Narrow to a slot number.
    pub fn to_index(&self) -> Result<u64, CoreError> {
        if !self.fits(64) {
            return Err(CoreError::InvalidValue("position exceeds u64"));
        }
        let mut le = [0u8; 8];
        le.copy_from_slice(&self.0[..8]);
        Ok(u64::from_le_bytes(le))
    }

    /// Reinterpret as a map key.
    pub fn to_key(&self) -> Hash32 {
        Hash32(self.0)
    }
}

/// One level of a witness.
#[derive(Clone, Copy, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathNode {
    /// Sibling hash at this level.
    pub sibling: Hash32,
    /// Whether the running node is the left child.
    pub is_left: bool,
}

/// Merkle witness for a tree of height `levels() + 1`.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MerkleWitness {
    /// Path nodes, leaf level first.
    pub path: Vec<PathNode>,
}

impl MerkleWitness {
    /// Wrap a leaf-to-root path.
    pub fn new(path: Vec<PathNode>) -> Self {
        Self { path }
    }

    /// Number of levels between leaf and root.
    pub fn levels(&self) -> usize {
        self.path.len()
    }

    /// Tree height this witness belongs to (leaf level counts as one).
    pub fn height(&self) -> usize {
        self.path.len() + 1
    }

    /// Leaf position decoded from the `is_left` flags.
    pub fn position(&self) -> Position {
        let mut pos = Position::default();
        for (i, node) in self.path.iter().enumerate().take(POSITION_BITS) {
            pos.set_bit(i, !node.is_left);
        }
        pos
    }

    /// Slot index; valid for trees of at most 64 levels.
    pub fn index(&self) -> Result<u64, CoreError> {
        if self.levels() > 64 {
            return Err(CoreError::InvalidValue("witness too deep for a slot index"));
        }
        self.position().to_index()
    }

    /// Map key; valid only for full-width witnesses.
    pub fn key(&self) -> Result<Hash32, CoreError> {
        if self.levels() != POSITION_BITS {
            return Err(CoreError::InvalidValue("witness is not a map witness"));
        }
        Ok(self.position().to_key())
    }
}

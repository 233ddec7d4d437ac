//! Sparse nullifier map.
//!
//! A 256-level sparse Merkle tree keyed by nullifier key. A leaf is zero while
//! unused and `NULLIFIER_USED` once spent; it is never reset.
//!
//! The engine only holds the root and proves transitions with witnesses
//! (`assert_unused`, `mark_used`). `NullifierMap` keeps the full map for
//! mirrors and tests.

use hashbrown::HashSet;

use shade_core::{Hash32, MerkleWitness, Position, Root, HASH32_LEN, NULLIFIER_MAP_LEVELS};

use crate::error::LedgerError;
use crate::merkle::{check_levels, compute_root, SparseMerkleTree};

/// Leaf value of a spent key.
pub const NULLIFIER_USED: Hash32 = {
    let mut bytes = [0u8; HASH32_LEN];
    bytes[0] = 1;
    Hash32(bytes)
};

/// Verify that `witness` addresses `key` and proves it unused under `root`.
pub fn assert_unused(root: &Root, witness: &MerkleWitness, key: &Hash32) -> Result<(), LedgerError> {
    check_levels(witness, NULLIFIER_MAP_LEVELS)?;
    let addressed = witness
        .key()
        .map_err(|_| LedgerError::InvalidWitness("nullifier witness"))?;
    if addressed != *key {
        return Err(LedgerError::IndexMismatch("nullifier witness addresses another key"));
    }
    if compute_root(witness, &NULLIFIER_USED) == *root {
        return Err(LedgerError::DoubleSpend);
    }
    if compute_root(witness, &Hash32::zero()) != *root {
        return Err(LedgerError::RootMismatch("nullifier witness does not prove against root"));
    }
    Ok(())
}

/// Root after marking the witnessed key used.
pub fn mark_used(witness: &MerkleWitness) -> Root {
    compute_root(witness, &NULLIFIER_USED)
}

/// Full in-memory nullifier map.
#[derive(Clone, Debug)]
pub struct NullifierMap {
    tree: SparseMerkleTree,
    used: HashSet<Hash32>,
}

impl NullifierMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            tree: SparseMerkleTree::new(NULLIFIER_MAP_LEVELS),
            used: HashSet::new(),
        }
    }

    /// Current root.
    pub fn root(&self) -> Root {
        self.tree.root()
    }

    /// Returns `true` if the key has been marked used.
    pub fn contains(&self, key: &Hash32) -> bool {
        self.used.contains(key)
    }

    /// Mark a key used.
    ///
    /// Returns `true` if the key was newly marked, `false` if it already was.
    pub fn insert(&mut self, key: Hash32) -> Result<bool, LedgerError> {
        if self.used.contains(&key) {
            return Ok(false);
        }
        self.tree.set_leaf(&Position::from_key(&key), NULLIFIER_USED)?;
        Ok(self.used.insert(key))
    }

    /// Witness for `key` (valid whether or not the key is used).
    pub fn witness(&self, key: &Hash32) -> Result<MerkleWitness, LedgerError> {
        self.tree.witness(&Position::from_key(key))
    }

    /// Number of used keys.
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// Whether no key is used.
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

impl Default for NullifierMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_then_used() {
        let mut map = NullifierMap::new();
        let key = Hash32([7u8; 32]);
        let w = map.witness(&key).unwrap();
        assert_unused(&map.root(), &w, &key).unwrap();
        let predicted = mark_used(&w);

        assert!(map.insert(key).unwrap());
        assert_eq!(map.root(), predicted);
        assert!(map.contains(&key));

        let w = map.witness(&key).unwrap();
        assert!(matches!(
            assert_unused(&map.root(), &w, &key),
            Err(LedgerError::DoubleSpend)
        ));
        assert!(!map.insert(key).unwrap());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn witness_for_other_key_rejected() {
        let map = NullifierMap::new();
        let w = map.witness(&Hash32([1u8; 32])).unwrap();
        assert!(matches!(
            assert_unused(&map.root(), &w, &Hash32([2u8; 32])),
            Err(LedgerError::IndexMismatch(_))
        ));
    }

    #[test]
    fn stale_witness_rejected() {
        let mut map = NullifierMap::new();
        let key = Hash32([3u8; 32]);
        let w = map.witness(&key).unwrap();
        map.insert(Hash32([4u8; 32])).unwrap();
        assert!(matches!(
            assert_unused(&map.root(), &w, &key),
            Err(LedgerError::RootMismatch(_))
        ));
    }
}

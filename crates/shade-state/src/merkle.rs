//! Fixed-height binary Merkle accumulator.
//!
//! The authoritative side never materializes a tree: it only recomputes roots
//! from witnesses (`compute_root`, `verify_leaf`). `SparseMerkleTree` keeps
//! the non-empty nodes of a full tree for mirrors and tests.
//!
//! Hash function: BLAKE3 node hashing from `shade-core`, empty leaf = zero.

use hashbrown::HashMap;

use shade_core::{empty_hashes, merkle_node, Hash32, MerkleWitness, PathNode, Position, Root};

use crate::error::LedgerError;

/// Root implied by `witness` for `leaf`.
pub fn compute_root(witness: &MerkleWitness, leaf: &Hash32) -> Root {
    witness
        .path
        .iter()
        .fold(*leaf, |acc, node| hash_step(&acc, node))
}

/// Combine a running hash with one witness level.
pub fn hash_step(current: &Hash32, node: &PathNode) -> Hash32 {
    if node.is_left {
        merkle_node(current, &node.sibling)
    } else {
        merkle_node(&node.sibling, current)
    }
}

/// Reject witnesses whose depth does not match the tree.
pub fn check_levels(witness: &MerkleWitness, levels: usize) -> Result<(), LedgerError> {
    if witness.levels() != levels {
        return Err(LedgerError::InvalidWitness("witness depth does not match tree"));
    }
    Ok(())
}

/// Verify that `witness` proves `leaf` under `root`.
pub fn verify_leaf(
    witness: &MerkleWitness,
    leaf: &Hash32,
    root: &Root,
    levels: usize,
) -> Result<(), LedgerError> {
    check_levels(witness, levels)?;
    if compute_root(witness, leaf) != *root {
        return Err(LedgerError::RootMismatch("leaf does not prove against root"));
    }
    Ok(())
}

/// Slot index encoded by a tree witness.
pub fn witness_index(witness: &MerkleWitness, levels: usize) -> Result<u64, LedgerError> {
    check_levels(witness, levels)?;
    witness
        .index()
        .map_err(|_| LedgerError::InvalidWitness("witness does not encode a slot index"))
}

/// Full binary tree over `2^levels` leaves storing only non-empty nodes.
#[derive(Clone, Debug)]
pub struct SparseMerkleTree {
    levels: usize,
    empty: Vec<Hash32>,
    /// Non-empty nodes keyed by `(level, position)`; level 0 holds leaves.
    nodes: HashMap<(usize, Position), Hash32>,
}

impl SparseMerkleTree {
    /// Empty tree with `levels` levels above the leaves.
    pub fn new(levels: usize) -> Self {
        Self {
            levels,
            empty: empty_hashes(levels),
            nodes: HashMap::new(),
        }
    }

    /// Levels above the leaf layer.
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Current root.
    pub fn root(&self) -> Root {
        self.node(self.levels, &Position::default())
    }

    /// Hash stored at `(level, pos)`, or the empty hash for that level.
    pub fn node(&self, level: usize, pos: &Position) -> Hash32 {
        match self.nodes.get(&(level, *pos)) {
            Some(h) => *h,
            None => self.empty.get(level).copied().unwrap_or_else(Hash32::zero),
        }
    }

    /// Leaf value at `pos`.
    pub fn leaf(&self, pos: &Position) -> Hash32 {
        self.node(0, pos)
    }

    /// Set a leaf and rehash its path; returns the new root.
    pub fn set_leaf(&mut self, pos: &Position, value: Hash32) -> Result<Root, LedgerError> {
        if !pos.fits(self.levels) {
            return Err(LedgerError::IndexMismatch("position outside tree"));
        }
        let mut cur_pos = *pos;
        let mut cur = value;
        self.store(0, cur_pos, cur);
        for level in 0..self.levels {
            let sibling = self.node(level, &cur_pos.sibling());
            cur = if cur_pos.is_left() {
                merkle_node(&cur, &sibling)
            } else {
                merkle_node(&sibling, &cur)
            };
            cur_pos = cur_pos.parent();
            self.store(level + 1, cur_pos, cur);
        }
        Ok(cur)
    }

    /// Witness for the leaf at `pos`.
    pub fn witness(&self, pos: &Position) -> Result<MerkleWitness, LedgerError> {
        if !pos.fits(self.levels) {
            return Err(LedgerError::IndexMismatch("position outside tree"));
        }
        let mut cur_pos = *pos;
        let mut path = Vec::with_capacity(self.levels);
        for level in 0..self.levels {
            path.push(PathNode {
                sibling: self.node(level, &cur_pos.sibling()),
                is_left: cur_pos.is_left(),
            });
            cur_pos = cur_pos.parent();
        }
        Ok(MerkleWitness::new(path))
    }

    fn store(&mut self, level: usize, pos: Position, value: Hash32) {
        let empty = self.empty.get(level).copied().unwrap_or_else(Hash32::zero);
        if value == empty {
            self.nodes.remove(&(level, pos));
        } else {
            self.nodes.insert((level, pos), value);
        }
    }
}

/// Account or UTXO tree addressed by slot number.
///
/// `height` counts the leaf layer, so a tree of height 32 has 31 witness levels.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    inner: SparseMerkleTree,
}

impl MerkleTree {
    /// Empty tree of the given height.
    pub fn new(height: usize) -> Self {
        Self {
            inner: SparseMerkleTree::new(height.saturating_sub(1)),
        }
    }

    /// Tree height (leaf layer included).
    pub fn height(&self) -> usize {
        self.inner.levels() + 1
    }

    /// Witness depth.
    pub fn levels(&self) -> usize {
        self.inner.levels()
    }

    /// Number of addressable slots, saturating at `u64::MAX`.
    pub fn capacity(&self) -> u64 {
        1u64.checked_shl(self.inner.levels() as u32).unwrap_or(u64::MAX)
    }

    /// Current root.
    pub fn root(&self) -> Root {
        self.inner.root()
    }

    /// Leaf at `index`.
    pub fn leaf(&self, index: u64) -> Hash32 {
        self.inner.leaf(&Position::from_index(index))
    }

    /// Overwrite the leaf at `index`; returns the new root.
    pub fn set_leaf(&mut self, index: u64, leaf: Hash32) -> Result<Root, LedgerError> {
        self.inner.set_leaf(&Position::from_index(index), leaf)
    }

    /// Witness for `index`.
    pub fn witness(&self, index: u64) -> Result<MerkleWitness, LedgerError> {
        self.inner.witness(&Position::from_index(index))
    }
}

//! Root after two leaves of the same tree change in one step.
//!
//! Both witnesses are taken against the same prior root. Below their lowest
//! common ancestor each side hashes up with its own siblings; at the ancestor
//! the two running hashes are the children and are combined directly. Above
//! it the first witness's siblings are still valid and the walk continues on
//! them alone.

use shade_core::{merkle_node, Hash32, MerkleWitness, Root};

use crate::error::LedgerError;
use crate::merkle::hash_step;

/// Root after setting `leaf1` under `w1` and `leaf2` under `w2`.
///
/// The witnesses must have the same depth and distinct positions.
pub fn dual_update(
    w1: &MerkleWitness,
    leaf1: &Hash32,
    w2: &MerkleWitness,
    leaf2: &Hash32,
) -> Result<Root, LedgerError> {
    if w1.levels() != w2.levels() {
        return Err(LedgerError::InvalidWitness("dual update depth mismatch"));
    }
    let mut a1 = w1.position();
    let mut a2 = w2.position();
    if a1 == a2 {
        return Err(LedgerError::IndexMismatch("dual update on the same leaf"));
    }

    let mut h1 = *leaf1;
    let mut h2 = *leaf2;
    let mut merged: Option<Hash32> = None;

    for (n1, n2) in w1.path.iter().zip(w2.path.iter()) {
        if let Some(h) = merged {
            merged = Some(hash_step(&h, n1));
            continue;
        }
        let (p1, p2) = (a1.parent(), a2.parent());
        if p1 == p2 {
            merged = Some(if n1.is_left {
                merkle_node(&h1, &h2)
            } else {
                merkle_node(&h2, &h1)
            });
        } else {
            h1 = hash_step(&h1, n1);
            h2 = hash_step(&h2, n2);
            a1 = p1;
            a2 = p2;
        }
    }

    merged.ok_or(LedgerError::InvalidWitness("witness paths never meet"))
}

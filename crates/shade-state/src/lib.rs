#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Shade ledger state machine.
//!
//! Responsibilities:
//! - Verify witnesses against the committed account, UTXO and nullifier roots
//! - Apply the five ledger operations atomically
//! - Emit the ordered facts an off-chain mirror needs to rebuild the trees
//!
//! Only roots and the UTXO counter are authoritative. Full trees in this crate
//! (`MerkleTree`, `NullifierMap`) exist for mirrors and tests.

pub mod apply;
pub mod dual;
pub mod error;
pub mod events;
pub mod merkle;
pub mod nullifier;

pub use apply::*;
pub use dual::*;
pub use error::*;
pub use events::*;
pub use merkle::*;
pub use nullifier::*;

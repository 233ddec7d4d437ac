#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Shade mirror.
//!
//! Rebuilds the account tree, the UTXO tree and the nullifier map by replaying
//! the ledger's ordered facts, and answers root/witness queries so clients can
//! assemble operations against the current roots. The mirror never writes
//! engine state.

pub mod builder;
pub mod error;
pub mod mirror;
pub mod source;

pub use builder::*;
pub use error::*;
pub use mirror::*;
pub use source::*;

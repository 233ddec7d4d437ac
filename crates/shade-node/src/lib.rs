#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Shade node.
//!
//! Hosts one ledger engine over a sled journal, keeps a mirror of its trees for
//! root and witness queries, and serves both over line-delimited JSON.

pub mod error;
pub mod ledger_store;
pub mod rpc;
pub mod rpc_client;

pub use error::*;
pub use ledger_store::*;
pub use rpc::*;
pub use rpc_client::*;

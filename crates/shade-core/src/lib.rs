#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Shade core: canonical types, constants, hashing, keys and serialization helpers.

pub mod constants;
pub mod crypto;
pub mod keys;
pub mod ops;
pub mod serialization;
pub mod types;
pub mod witness;

pub use constants::*;
pub use crypto::*;
pub use keys::*;
pub use ops::*;
pub use serialization::*;
pub use types::*;
pub use witness::*;

//! Node errors.

use shade_core::CoreError;
use shade_mirror::MirrorError;
use shade_state::LedgerError;
use thiserror::Error;

/// Errors raised while hosting the ledger.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The engine rejected an operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The query mirror failed to apply or answer.
    #[error(transparent)]
    Mirror(#[from] MirrorError),

    /// Stored or submitted bytes failed to decode.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// sled failed.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// The journal contradicts itself.
    #[error("corrupt ledger db: {0}")]
    Corrupt(&'static str),

    /// The journal was written for another tree height.
    #[error("ledger db was created with tree height {stored}, configured {configured}")]
    HeightMismatch {
        /// Height recorded in the db.
        stored: u64,
        /// Height requested at startup.
        configured: u64,
    },
}

impl NodeError {
    /// Name reported to RPC callers.
    pub fn check(&self) -> &'static str {
        match self {
            NodeError::Ledger(e) => e.check(),
            NodeError::Mirror(_) => "query_failed",
            NodeError::Core(_) => "malformed_input",
            NodeError::Storage(_) | NodeError::Corrupt(_) | NodeError::HeightMismatch { .. } => {
                "storage_failure"
            }
        }
    }
}

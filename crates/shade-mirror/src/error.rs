//! Mirror errors.

use shade_core::CoreError;
use shade_state::LedgerError;
use thiserror::Error;

/// Errors produced by the mirror, its event sources and the builder.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// An event arrived ahead of the cursor; fetch again from the cursor.
    #[error("event gap: expected seq {expected}, got {got}")]
    Gap {
        /// Next sequence number the mirror can apply.
        expected: u64,
        /// Sequence number received.
        got: u64,
    },

    /// The event stream is temporarily unavailable.
    #[error("event source unavailable: {0}")]
    Unavailable(String),

    /// A query named an unknown tree or used the wrong selector.
    #[error("invalid query: {0}")]
    InvalidQuery(&'static str),

    /// The mirror has no record needed to build an operation.
    #[error("unknown leaf: {0}")]
    UnknownLeaf(&'static str),

    /// Local tree update failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Malformed key or encoding.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl MirrorError {
    /// Whether polling again may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MirrorError::Gap { .. } | MirrorError::Unavailable(_))
    }
}

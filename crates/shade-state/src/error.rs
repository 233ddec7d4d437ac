//! Ledger transition errors.

use shade_core::CoreError;
use thiserror::Error;

/// Errors produced while checking or applying an operation.
///
/// Every variant voids the whole operation; nothing is committed.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A witness does not prove its claimed leaf against the stored root.
    #[error("root mismatch: {0}")]
    RootMismatch(&'static str),

    /// A signature or nullifier authorization failed, or names the wrong owner.
    #[error("authorization failure: {0}")]
    AuthorizationFailure(&'static str),

    /// The nullifier key is already marked used.
    #[error("double spend detected")]
    DoubleSpend,

    /// An append target is not the current counter, or two slots collide.
    #[error("index mismatch: {0}")]
    IndexMismatch(&'static str),

    /// Input and output sums differ.
    #[error("conservation violation: inputs {inputs} != outputs {outputs}")]
    ConservationViolation {
        /// Authenticated input total.
        inputs: u64,
        /// Declared output total.
        outputs: u64,
    },

    /// Amount exceeds the sender's balance.
    #[error("insufficient balance")]
    InsufficientBalance,

    /// A witness has the wrong shape for its tree.
    #[error("invalid witness: {0}")]
    InvalidWitness(&'static str),

    /// Balance or sum arithmetic overflowed.
    #[error("amount overflow")]
    AmountOverflow,

    /// Malformed key, point or encoding.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl LedgerError {
    /// Stable name of the failed check.
    pub fn check(&self) -> &'static str {
        match self {
            LedgerError::RootMismatch(_) => "root_mismatch",
            LedgerError::AuthorizationFailure(_) => "authorization_failure",
            LedgerError::DoubleSpend => "double_spend",
            LedgerError::IndexMismatch(_) => "index_mismatch",
            LedgerError::ConservationViolation { .. } => "conservation_violation",
            LedgerError::InsufficientBalance => "insufficient_balance",
            LedgerError::InvalidWitness(_) => "invalid_witness",
            LedgerError::AmountOverflow => "amount_overflow",
            LedgerError::Core(_) => "malformed_input",
        }
    }
}

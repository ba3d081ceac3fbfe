use thiserror::Error;

use crate::chain::InvalidReason;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors surfaced by ledger operations.
///
/// Query misses are not errors: lookups return `Option` and callers decide.
/// `TransactionNotFound` and `BlockNotFound` exist for callers that need to
/// turn a miss into a failure (the HTTP layer, for one).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("duplicate transaction: {0}")]
    DuplicateTransaction(String),

    #[error("nothing to mine: the transaction pool is empty")]
    NothingToMine,

    #[error("chain link mismatch: expected block {expected_number}, got {got_number}")]
    ChainLinkMismatch { expected_number: u64, got_number: u64 },

    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("block not found: {0}")]
    BlockNotFound(u64),

    #[error("merkle verification failed at step {step}")]
    MerkleVerificationFailed { step: usize },

    #[error("chain integrity violation at block {block_number}: {reason}")]
    ChainIntegrityViolation {
        block_number: u64,
        reason: InvalidReason,
    },

    #[error("mining cancelled")]
    MiningCancelled,

    #[error("invalid difficulty {0}: must be at most 256 bits")]
    InvalidDifficulty(u32),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    /// Everything except an integrity violation can be retried or reported
    /// back to the caller without losing trust in the chain.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LedgerError::ChainIntegrityViolation { .. })
    }
}

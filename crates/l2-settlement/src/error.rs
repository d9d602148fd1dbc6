//! Error types for the settlement coordinator
//!
//! Every failing operation leaves coordinator state untouched, so callers can
//! inspect the variant and decide whether resubmitting makes sense.

use shared_types::{Address, Amount, BlockNumber, TokenId};
use thiserror::Error;

/// Settlement coordinator errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    /// Zero amount, empty batch, or an amount that cannot be represented
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Caller is not an authorized validator or not the watchdog
    #[error("Unauthorized caller: {caller:?}")]
    Unauthorized { caller: Address },

    /// Block number presented out of sequence
    #[error("Out of order block: expected {expected}, got {actual}")]
    OutOfOrder {
        expected: BlockNumber,
        actual: BlockNumber,
    },

    /// Not enough unclaimed holders for the requested commit
    #[error("Insufficient holders: requested {requested}, available {available}")]
    InsufficientHolders { requested: u64, available: u64 },

    /// External verifier rejected the proof
    #[error("Proof rejected for block {block}")]
    ProofRejected { block: BlockNumber },

    /// Withdrawal exceeds the available balance
    #[error("Insufficient balance for {owner:?} token {token}: required {required}, available {available}")]
    InsufficientBalance {
        owner: Address,
        token: TokenId,
        required: Amount,
        available: Amount,
    },

    /// (owner, token) already recovered its funds during exodus
    #[error("Already exited: {owner:?} token {token}")]
    AlreadyExited { owner: Address, token: TokenId },

    /// Exodus is active - the block pipeline no longer accepts mutations
    #[error("System halted - exodus mode is active")]
    SystemHalted,

    /// Balance arithmetic would exceed the representable range
    #[error("Balance overflow for {owner:?} token {token}")]
    Overflow { owner: Address, token: TokenId },

    /// Block number has not been committed yet
    #[error("Block {block} has not been committed")]
    BlockNotCommitted { block: BlockNumber },

    /// Block is past its expiry threshold and can only be reverted
    #[error("Block {block} expired at height {expired_at}")]
    BlockExpired {
        block: BlockNumber,
        expired_at: u64,
    },

    /// Expired blocks must be reverted before new commits are accepted
    #[error("Expired block {block} must be reverted before committing")]
    ExpiredBlocksPending { block: BlockNumber },

    /// Too many committed-but-unverified blocks outstanding
    #[error("Too many unverified blocks: {outstanding} outstanding, limit {limit}")]
    TooManyUnverified { outstanding: u64, limit: u64 },

    /// Exodus was already triggered
    #[error("Exodus already triggered")]
    AlreadyTriggered,

    /// Operation only valid once exodus is active
    #[error("Exodus is not active")]
    NotInExodus,

    /// Exit batch owners/amounts lengths differ
    #[error("Batch length mismatch: {owners} owners, {amounts} amounts")]
    BatchLengthMismatch { owners: usize, amounts: usize },

    /// Governance does not know the token address
    #[error("Unknown token address: {address:?}")]
    UnknownToken { address: Address },

    /// Snapshot could not be encoded or decoded
    #[error("Snapshot error: {reason}")]
    Snapshot { reason: String },
}

impl SettlementError {
    /// Conditions a caller may resolve by resubmitting later or with
    /// corrected input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProofRejected { .. }
                | Self::InsufficientHolders { .. }
                | Self::InsufficientBalance { .. }
                | Self::ExpiredBlocksPending { .. }
                | Self::TooManyUnverified { .. }
        )
    }

    /// Conditions that no resubmission can ever fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::SystemHalted | Self::AlreadyExited { .. } | Self::AlreadyTriggered
        )
    }

    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::Unauthorized { .. } => "unauthorized",
            Self::OutOfOrder { .. } => "out_of_order",
            Self::InsufficientHolders { .. } => "insufficient_holders",
            Self::ProofRejected { .. } => "proof_rejected",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::AlreadyExited { .. } => "already_exited",
            Self::SystemHalted => "system_halted",
            Self::Overflow { .. } => "overflow",
            Self::BlockNotCommitted { .. } => "block_not_committed",
            Self::BlockExpired { .. } => "block_expired",
            Self::ExpiredBlocksPending { .. } => "expired_blocks_pending",
            Self::TooManyUnverified { .. } => "too_many_unverified",
            Self::AlreadyTriggered => "already_triggered",
            Self::NotInExodus => "not_in_exodus",
            Self::BatchLengthMismatch { .. } => "batch_length_mismatch",
            Self::UnknownToken { .. } => "unknown_token",
            Self::Snapshot { .. } => "snapshot",
        }
    }
}

/// Result type for settlement operations
pub type SettlementResult<T> = Result<T, SettlementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_and_permanent_are_disjoint() {
        let errors = vec![
            SettlementError::ProofRejected { block: 1 },
            SettlementError::InsufficientHolders {
                requested: 2,
                available: 1,
            },
            SettlementError::SystemHalted,
            SettlementError::AlreadyExited {
                owner: [1u8; 20],
                token: 0,
            },
            SettlementError::AlreadyTriggered,
        ];

        for err in errors {
            assert!(!(err.is_retryable() && err.is_permanent()), "{err}");
        }
    }

    #[test]
    fn test_classification() {
        assert!(SettlementError::ProofRejected { block: 3 }.is_retryable());
        assert!(SettlementError::SystemHalted.is_permanent());
        assert!(!SettlementError::SystemHalted.is_retryable());
        assert!(!SettlementError::OutOfOrder {
            expected: 1,
            actual: 2
        }
        .is_permanent());
    }
}

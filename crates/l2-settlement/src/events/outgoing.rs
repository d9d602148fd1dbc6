//! Outgoing events emitted on state transitions

use crate::domain::{ExodusActivation, HolderRange};
use serde::{Deserialize, Serialize};
use shared_types::{Address, Amount, BlockHeight, BlockNumber, Hash, TokenId};
use uuid::Uuid;

/// Correlation ID attached to every event
pub type CorrelationId = Uuid;

/// Block committed by a validator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCommittedEvent {
    pub correlation_id: CorrelationId,
    pub block: BlockNumber,
    pub new_state_root: Hash,
    pub holder_range: HolderRange,
    pub validator: Address,
    pub committed_at: BlockHeight,
}

/// Block proof accepted and holders applied
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVerifiedEvent {
    pub correlation_id: CorrelationId,
    pub block: BlockNumber,
    pub new_state_root: Hash,
    pub holder_range: HolderRange,
    pub verified_by: Address,
    pub verified_at: BlockHeight,
}

/// Expired blocks (and the blocks built on them) reverted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocksRevertedEvent {
    pub correlation_id: CorrelationId,
    pub expired: Vec<BlockNumber>,
    pub invalidated: Vec<BlockNumber>,
    pub released: HolderRange,
    pub reverted_at: BlockHeight,
}

/// Exodus latch set
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExodusTriggeredEvent {
    pub correlation_id: CorrelationId,
    pub activation: ExodusActivation,
}

/// Exit batch credited
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsRecoveredEvent {
    pub correlation_id: CorrelationId,
    pub token: TokenId,
    pub owners: Vec<Address>,
    pub amounts: Vec<Amount>,
}

/// Unsettled holders drained during exodus
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDrainedEvent {
    pub correlation_id: CorrelationId,
    pub refunded_deposits: u64,
    pub cancelled_withdrawals: u64,
    /// Sequence numbers of deposits that could not be refunded
    pub unrefundable: Vec<u64>,
}

/// Every event the coordinator emits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SettlementEvent {
    BlockCommitted(BlockCommittedEvent),
    BlockVerified(BlockVerifiedEvent),
    BlocksReverted(BlocksRevertedEvent),
    ExodusTriggered(ExodusTriggeredEvent),
    FundsRecovered(FundsRecoveredEvent),
    PendingDrained(PendingDrainedEvent),
}

impl SettlementEvent {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            Self::BlockCommitted(e) => e.correlation_id,
            Self::BlockVerified(e) => e.correlation_id,
            Self::BlocksReverted(e) => e.correlation_id,
            Self::ExodusTriggered(e) => e.correlation_id,
            Self::FundsRecovered(e) => e.correlation_id,
            Self::PendingDrained(e) => e.correlation_id,
        }
    }

    /// Event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BlockCommitted(_) => "BlockCommitted",
            Self::BlockVerified(_) => "BlockVerified",
            Self::BlocksReverted(_) => "BlocksReverted",
            Self::ExodusTriggered(_) => "ExodusTriggered",
            Self::FundsRecovered(_) => "FundsRecovered",
            Self::PendingDrained(_) => "PendingDrained",
        }
    }
}

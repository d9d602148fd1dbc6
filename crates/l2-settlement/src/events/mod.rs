//! Events module for the settlement coordinator

pub mod outgoing;

pub use outgoing::{
    BlockCommittedEvent, BlockVerifiedEvent, BlocksRevertedEvent, CorrelationId,
    ExodusTriggeredEvent, FundsRecoveredEvent, PendingDrainedEvent, SettlementEvent,
};

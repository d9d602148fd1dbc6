//! Driving Ports (API - Inbound)
//!
//! The exposed surface of the settlement coordinator.

use crate::domain::{
    BalanceEntry, Block, BlockStatus, ExodusActivation, Holder, HolderRange, RevertOutcome,
    SettlementSnapshot,
};
use crate::error::SettlementResult;
use crate::events::SettlementEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{Address, Amount, BlockHeight, BlockNumber, Hash, TokenId};

/// Result of a successful verification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub block: BlockNumber,
    pub new_state_root: Hash,
    pub holder_range: HolderRange,
    /// Deposits credited (locked) by this block
    pub deposits: u64,
    /// Withdrawals debited by this block
    pub withdrawals: u64,
}

/// Result of a successful exodus exit batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitOutcome {
    pub token: TokenId,
    pub owners: usize,
    pub recovered: Amount,
}

/// Result of draining unsettled holders during exodus
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainOutcome {
    /// Deposits refunded to `available`
    pub refunded_deposits: u64,
    /// Withdrawals dropped without moving funds
    pub cancelled_withdrawals: u64,
    /// Deposits whose refund would overflow the owner's balance; consumed
    /// without a credit so later holders can still drain
    pub unrefundable: Vec<u64>,
    /// Unsettled holders still left after this call
    pub remaining: u64,
}

/// Pipeline counters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTotals {
    pub total_committed: u64,
    pub total_verified: u64,
    pub last_verified_root: Hash,
    pub holders: u64,
    pub unclaimed_holders: u64,
    pub unsettled_holders: u64,
}

/// Liveness facts a watchdog bases its trigger decision on
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessReport {
    pub height: BlockHeight,
    pub exodus: bool,
    pub outstanding_blocks: u64,
    pub oldest_unverified: Option<BlockNumber>,
    pub oldest_unverified_expired: bool,
    pub consecutive_expiry_reverts: u64,
}

/// Primary settlement API
///
/// Every mutating call is atomic: it either applies completely or leaves the
/// coordinator unchanged and returns an error.
#[async_trait]
pub trait SettlementApi: Send + Sync {
    /// Queue a deposit of `amount` of `token` for `owner`.
    async fn append_deposit(
        &self,
        token: TokenId,
        owner: Address,
        amount: Amount,
    ) -> SettlementResult<u64>;

    /// Queue a deposit, resolving the token id through governance.
    async fn append_deposit_for_token_address(
        &self,
        token_address: Address,
        owner: Address,
        amount: Amount,
    ) -> SettlementResult<u64>;

    /// Queue a withdrawal of `amount` of `token` for `owner`.
    async fn append_withdraw(
        &self,
        token: TokenId,
        owner: Address,
        amount: Amount,
    ) -> SettlementResult<u64>;

    /// Commit block `number`, claiming the next `claim_count` holders.
    async fn commit(
        &self,
        number: BlockNumber,
        new_state_root: Hash,
        data_commitment: Hash,
        claim_count: u64,
        validator: Address,
    ) -> SettlementResult<Block>;

    /// Verify block `number` with `proof` and apply its holders.
    async fn verify(
        &self,
        number: BlockNumber,
        proof: Vec<u8>,
        validator: Address,
    ) -> SettlementResult<VerifyOutcome>;

    /// Revert expired blocks and every block built on them.
    async fn revert_expired(&self) -> SettlementResult<RevertOutcome>;

    /// Enter exodus. Only the watchdog may call this.
    async fn trigger(&self, caller: Address) -> SettlementResult<ExodusActivation>;

    /// Recover balances for a batch of owners with a proof against the last
    /// verified state root.
    async fn exit(
        &self,
        token: TokenId,
        owners: Vec<Address>,
        amounts: Vec<Amount>,
        proof: Vec<u8>,
    ) -> SettlementResult<ExitOutcome>;

    /// Refund up to `limit` unsettled holders once exodus is active.
    async fn drain_pending(&self, limit: u64) -> SettlementResult<DrainOutcome>;

    /// Effective balance at the current height.
    async fn balance(&self, owner: Address, token: TokenId) -> BalanceEntry;

    async fn block(&self, number: BlockNumber) -> Option<Block>;

    async fn block_status(&self, number: BlockNumber) -> Option<BlockStatus>;

    async fn totals(&self) -> PipelineTotals;

    async fn is_exodus(&self) -> bool;

    async fn unclaimed_holders(&self) -> Vec<Holder>;

    async fn liveness(&self) -> LivenessReport;

    /// Drain buffered outgoing events.
    async fn take_events(&self) -> Vec<SettlementEvent>;

    async fn snapshot(&self) -> SettlementSnapshot;
}

//! Coordinator aggregate
//!
//! `SettlementState` owns the four components and implements every
//! operation against them. Operations validate first and mutate last, and
//! multi-entry balance changes go through a [`LedgerBatch`](crate::domain::LedgerBatch),
//! so a failing call leaves the aggregate untouched.

use crate::domain::{
    BalanceEntry, BalanceLedger, Block, BlockPipeline, ExodusActivation, ExodusController,
    HolderKind, HolderQueue, HolderRange, RevertOutcome, SettlementSnapshot,
};
use crate::error::{SettlementError, SettlementResult};
use crate::events::{
    BlockCommittedEvent, BlockVerifiedEvent, BlocksRevertedEvent, ExodusTriggeredEvent,
    FundsRecoveredEvent, PendingDrainedEvent, SettlementEvent,
};
use crate::ports::inbound::{
    DrainOutcome, ExitOutcome, LivenessReport, PipelineTotals, VerifyOutcome,
};
use crate::ports::outbound::{Governance, ProofVerifier};
use crate::types::SettlementConfig;
use shared_types::{Address, Amount, BlockHeight, BlockNumber, Hash, TokenId};
use uuid::Uuid;

/// Everything an operation may consult besides the aggregate itself
#[derive(Clone, Copy)]
pub struct OperationContext<'a> {
    pub config: &'a SettlementConfig,
    pub governance: &'a dyn Governance,
    pub verifier: &'a dyn ProofVerifier,
    /// Current root-chain height
    pub now: BlockHeight,
}

impl OperationContext<'_> {
    fn ensure_validator(&self, identity: &Address) -> SettlementResult<()> {
        if !self.governance.is_authorized_validator(identity) {
            return Err(SettlementError::Unauthorized { caller: *identity });
        }
        Ok(())
    }
}

/// The whole coordinator state, guarded as one unit
#[derive(Debug)]
pub struct SettlementState {
    pub ledger: BalanceLedger,
    pub queue: HolderQueue,
    pub pipeline: BlockPipeline,
    pub exodus: ExodusController,
    /// Events waiting to be taken by the service
    pending_events: Vec<SettlementEvent>,
}

impl SettlementState {
    pub fn new(config: &SettlementConfig) -> Self {
        Self {
            ledger: BalanceLedger::new(),
            queue: HolderQueue::new(),
            pipeline: BlockPipeline::new(config.genesis_state_root),
            exodus: ExodusController::new(),
            pending_events: Vec::new(),
        }
    }

    /// Rebuild from a snapshot, refusing one that is internally inconsistent.
    pub fn from_snapshot(snapshot: SettlementSnapshot) -> SettlementResult<Self> {
        snapshot.validate()?;
        Ok(Self {
            ledger: BalanceLedger::from_entries(snapshot.balances),
            queue: HolderQueue::restore(
                snapshot.holders,
                snapshot.holder_cursor,
                snapshot.holders_settled_through,
            ),
            pipeline: BlockPipeline::restore(
                snapshot.blocks,
                snapshot.total_verified,
                snapshot.last_verified_root,
                snapshot.reverted_blocks,
                snapshot.consecutive_expiry_reverts,
            ),
            exodus: ExodusController::restore(snapshot.exodus, snapshot.exited),
            pending_events: Vec::new(),
        })
    }

    pub fn to_snapshot(&self, saved_at: BlockHeight) -> SettlementSnapshot {
        SettlementSnapshot {
            saved_at,
            balances: self.ledger.entries().map(|(k, v)| (*k, *v)).collect(),
            holders: self.queue.all().to_vec(),
            holder_cursor: self.queue.cursor(),
            holders_settled_through: self.queue.settled_through(),
            blocks: self.pipeline.blocks().to_vec(),
            total_verified: self.pipeline.total_verified(),
            last_verified_root: self.pipeline.last_verified_root(),
            reverted_blocks: self.pipeline.reverted_log().to_vec(),
            consecutive_expiry_reverts: self.pipeline.consecutive_expiry_reverts(),
            exodus: *self.exodus.mode(),
            exited: self.exodus.exited().copied().collect(),
        }
        .normalized()
    }

    /// Take and clear pending events
    pub fn take_events(&mut self) -> Vec<SettlementEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // =========================================================================
    // HOLDER QUEUE
    // =========================================================================

    /// Queue a deposit or withdrawal.
    pub fn append(
        &mut self,
        kind: HolderKind,
        token: TokenId,
        owner: Address,
        amount: Amount,
    ) -> SettlementResult<u64> {
        self.exodus.mode().ensure_normal()?;
        let settled_total = self.ledger.total(&owner, token);
        self.queue.append(kind, token, owner, amount, settled_total)
    }

    // =========================================================================
    // BLOCK PIPELINE
    // =========================================================================

    pub fn commit(
        &mut self,
        ctx: &OperationContext<'_>,
        number: BlockNumber,
        new_state_root: Hash,
        data_commitment: Hash,
        claim_count: u64,
        validator: Address,
    ) -> SettlementResult<Block> {
        self.exodus.mode().ensure_normal()?;
        ctx.ensure_validator(&validator)?;

        let expected = self.pipeline.next_commit_number();
        if number != expected {
            return Err(SettlementError::OutOfOrder {
                expected,
                actual: number,
            });
        }

        if let Some(expired) = self
            .pipeline
            .oldest_expired(ctx.now, ctx.config.expiry_threshold)
        {
            return Err(SettlementError::ExpiredBlocksPending {
                block: expired.number,
            });
        }

        let outstanding = self.pipeline.outstanding();
        if outstanding >= ctx.config.max_unverified_blocks {
            return Err(SettlementError::TooManyUnverified {
                outstanding,
                limit: ctx.config.max_unverified_blocks,
            });
        }

        // Last fallible step: nothing has been mutated if the claim fails.
        let holder_range = self.queue.claim(claim_count)?;

        let block = Block::new(
            number,
            new_state_root,
            data_commitment,
            validator,
            holder_range,
            ctx.now,
        );
        self.pipeline.push(block.clone());

        self.pending_events
            .push(SettlementEvent::BlockCommitted(BlockCommittedEvent {
                correlation_id: Uuid::new_v4(),
                block: number,
                new_state_root,
                holder_range,
                validator,
                committed_at: ctx.now,
            }));

        Ok(block)
    }

    pub fn verify(
        &mut self,
        ctx: &OperationContext<'_>,
        number: BlockNumber,
        proof: &[u8],
        validator: Address,
    ) -> SettlementResult<VerifyOutcome> {
        self.exodus.mode().ensure_normal()?;
        ctx.ensure_validator(&validator)?;

        let expected = self.pipeline.next_verify_number();
        if number != expected {
            return Err(SettlementError::OutOfOrder {
                expected,
                actual: number,
            });
        }

        let block = self
            .pipeline
            .block(number)
            .ok_or(SettlementError::BlockNotCommitted { block: number })?;

        let threshold = ctx.config.expiry_threshold;
        if block.is_expired(ctx.now, threshold) {
            return Err(SettlementError::BlockExpired {
                block: number,
                expired_at: block.expires_at(threshold),
            });
        }

        if !ctx
            .verifier
            .verify_block_proof(&block.data_commitment, &block.new_state_root, proof)
        {
            return Err(SettlementError::ProofRejected { block: number });
        }

        let holder_range = block.holder_range;
        let lock_until = ctx.now.saturating_add(ctx.config.deposit_maturation);
        let mut deposits = 0u64;
        let mut withdrawals = 0u64;

        // Apply in ascending sequence order; any failure drops the batch.
        let mut batch = self.ledger.stage();
        for holder in self.queue.holders_in(holder_range) {
            match holder.kind {
                HolderKind::Deposit => {
                    batch.credit(&holder.owner, holder.token, holder.amount, lock_until, ctx.now)?;
                    deposits += 1;
                }
                HolderKind::Withdraw => {
                    batch.debit(&holder.owner, holder.token, holder.amount, ctx.now)?;
                    withdrawals += 1;
                }
            }
        }
        batch.commit();

        self.queue.settle(holder_range);
        let verified = self.pipeline.mark_verified(ctx.now);
        let new_state_root = verified.new_state_root;

        self.pending_events
            .push(SettlementEvent::BlockVerified(BlockVerifiedEvent {
                correlation_id: Uuid::new_v4(),
                block: number,
                new_state_root,
                holder_range,
                verified_by: validator,
                verified_at: ctx.now,
            }));

        Ok(VerifyOutcome {
            block: number,
            new_state_root,
            holder_range,
            deposits,
            withdrawals,
        })
    }

    /// Revert the oldest unverified block if it expired, together with every
    /// block committed after it.
    pub fn revert_expired(&mut self, ctx: &OperationContext<'_>) -> SettlementResult<RevertOutcome> {
        self.exodus.mode().ensure_normal()?;

        let threshold = ctx.config.expiry_threshold;
        if self.pipeline.oldest_expired(ctx.now, threshold).is_none() {
            return Ok(RevertOutcome::default());
        }

        // Classify before truncation marks everything reverted.
        let mut outcome = RevertOutcome::default();
        let mut still_expired = true;
        for block in self.pipeline.blocks().iter().skip(self.pipeline.total_verified() as usize) {
            still_expired = still_expired && block.is_expired(ctx.now, threshold);
            if still_expired {
                outcome.expired.push(block.number);
            } else {
                outcome.invalidated.push(block.number);
            }
        }

        let removed = self.pipeline.truncate_unverified();
        for block in removed.iter().rev() {
            self.queue.release(block.holder_range);
        }
        if let (Some(first), Some(last)) = (removed.first(), removed.last()) {
            outcome.released = HolderRange::new(first.holder_range.start, last.holder_range.end);
        }

        self.pending_events
            .push(SettlementEvent::BlocksReverted(BlocksRevertedEvent {
                correlation_id: Uuid::new_v4(),
                expired: outcome.expired.clone(),
                invalidated: outcome.invalidated.clone(),
                released: outcome.released,
                reverted_at: ctx.now,
            }));

        Ok(outcome)
    }

    // =========================================================================
    // EXODUS
    // =========================================================================

    pub fn trigger(
        &mut self,
        ctx: &OperationContext<'_>,
        caller: Address,
    ) -> SettlementResult<ExodusActivation> {
        if caller != ctx.config.watchdog {
            return Err(SettlementError::Unauthorized { caller });
        }

        let activation = self.exodus.trigger(ExodusActivation {
            triggered_at: ctx.now,
            last_verified_root: self.pipeline.last_verified_root(),
            last_verified_block: self.pipeline.total_verified(),
        })?;

        self.pending_events
            .push(SettlementEvent::ExodusTriggered(ExodusTriggeredEvent {
                correlation_id: Uuid::new_v4(),
                activation,
            }));

        Ok(activation)
    }

    pub fn exit(
        &mut self,
        ctx: &OperationContext<'_>,
        token: TokenId,
        owners: &[Address],
        amounts: &[Amount],
        proof: &[u8],
    ) -> SettlementResult<ExitOutcome> {
        let activation = self.exodus.mode().ensure_exodus()?;

        if owners.len() != amounts.len() {
            return Err(SettlementError::BatchLengthMismatch {
                owners: owners.len(),
                amounts: amounts.len(),
            });
        }
        if owners.is_empty() {
            return Err(SettlementError::InvalidAmount {
                reason: "exit batch is empty".into(),
            });
        }

        self.exodus.check_batch(token, owners)?;

        if !ctx.verifier.verify_exit_proof(
            token,
            owners,
            amounts,
            &activation.last_verified_root,
            proof,
        ) {
            return Err(SettlementError::ProofRejected {
                block: activation.last_verified_block,
            });
        }

        let mut batch = self.ledger.stage();
        let mut recovered: Amount = 0;
        for (owner, amount) in owners.iter().zip(amounts) {
            batch.credit_recovered(owner, token, *amount)?;
            recovered = recovered.saturating_add(*amount);
        }
        batch.commit();
        self.exodus.mark_exited(token, owners);

        self.pending_events
            .push(SettlementEvent::FundsRecovered(FundsRecoveredEvent {
                correlation_id: Uuid::new_v4(),
                token,
                owners: owners.to_vec(),
                amounts: amounts.to_vec(),
            }));

        Ok(ExitOutcome {
            token,
            owners: owners.len(),
            recovered,
        })
    }

    /// Refund unsettled deposits and cancel unsettled withdrawals.
    pub fn drain_pending(&mut self, limit: u64) -> SettlementResult<DrainOutcome> {
        self.exodus.mode().ensure_exodus()?;

        let start = self.queue.settled_through();
        let end = start.saturating_add(limit).min(self.queue.len());
        let range = HolderRange::new(start, end);

        let mut outcome = DrainOutcome::default();
        let mut batch = self.ledger.stage();
        for holder in self.queue.holders_in(range) {
            match holder.kind {
                HolderKind::Deposit => {
                    match batch.credit_recovered(&holder.owner, holder.token, holder.amount) {
                        Ok(()) => outcome.refunded_deposits += 1,
                        Err(SettlementError::Overflow { .. }) => {
                            outcome.unrefundable.push(holder.sequence)
                        }
                        Err(e) => return Err(e),
                    }
                }
                HolderKind::Withdraw => outcome.cancelled_withdrawals += 1,
            }
        }
        batch.commit();

        let drained = self.queue.drain_unsettled(range.len());
        debug_assert_eq!(drained.len() as u64, range.len());
        outcome.remaining = self.queue.unsettled_count();

        if !range.is_empty() {
            self.pending_events
                .push(SettlementEvent::PendingDrained(PendingDrainedEvent {
                    correlation_id: Uuid::new_v4(),
                    refunded_deposits: outcome.refunded_deposits,
                    cancelled_withdrawals: outcome.cancelled_withdrawals,
                    unrefundable: outcome.unrefundable.clone(),
                }));
        }

        Ok(outcome)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn balance(&self, owner: &Address, token: TokenId, now: BlockHeight) -> BalanceEntry {
        self.ledger.balance(owner, token, now)
    }

    pub fn totals(&self) -> PipelineTotals {
        PipelineTotals {
            total_committed: self.pipeline.total_committed(),
            total_verified: self.pipeline.total_verified(),
            last_verified_root: self.pipeline.last_verified_root(),
            holders: self.queue.len(),
            unclaimed_holders: self.queue.unclaimed_count(),
            unsettled_holders: self.queue.unsettled_count(),
        }
    }

    pub fn liveness(&self, now: BlockHeight, expiry_threshold: BlockHeight) -> LivenessReport {
        let oldest = self.pipeline.oldest_unverified();
        LivenessReport {
            height: now,
            exodus: self.exodus.is_active(),
            outstanding_blocks: self.pipeline.outstanding(),
            oldest_unverified: oldest.map(|b| b.number),
            oldest_unverified_expired: oldest
                .map(|b| b.is_expired(now, expiry_threshold))
                .unwrap_or(false),
            consecutive_expiry_reverts: self.pipeline.consecutive_expiry_reverts(),
        }
    }
}

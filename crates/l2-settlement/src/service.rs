//! Settlement Service - wires the coordinator state to its ports
//!
//! All four components live behind one lock, so every call observes and
//! leaves a consistent coordinator.

use crate::domain::{
    BalanceEntry, Block, BlockStatus, ExodusActivation, Holder, HolderKind, RevertOutcome,
    SettlementSnapshot,
};
use crate::error::{SettlementError, SettlementResult};
use crate::events::SettlementEvent;
use crate::metrics;
use crate::ports::inbound::{
    DrainOutcome, ExitOutcome, LivenessReport, PipelineTotals, SettlementApi, VerifyOutcome,
};
use crate::ports::outbound::{Governance, HeightSource, ProofVerifier};
use crate::state::{OperationContext, SettlementState};
use crate::types::SettlementConfig;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Address, Amount, BlockNumber, Hash, ShortHex, TokenId};
use std::sync::Arc;

/// Settlement coordinator service
pub struct SettlementService<G, V, H>
where
    G: Governance,
    V: ProofVerifier,
    H: HeightSource,
{
    config: SettlementConfig,
    state: Arc<RwLock<SettlementState>>,
    governance: Arc<G>,
    verifier: Arc<V>,
    height: Arc<H>,
}

impl<G, V, H> SettlementService<G, V, H>
where
    G: Governance,
    V: ProofVerifier,
    H: HeightSource,
{
    pub fn new(config: SettlementConfig, governance: Arc<G>, verifier: Arc<V>, height: Arc<H>) -> Self {
        let state = SettlementState::new(&config);
        Self::with_state(config, state, governance, verifier, height)
    }

    /// Rebuild a service from a persisted snapshot.
    pub fn from_snapshot(
        config: SettlementConfig,
        snapshot: SettlementSnapshot,
        governance: Arc<G>,
        verifier: Arc<V>,
        height: Arc<H>,
    ) -> SettlementResult<Self> {
        tracing::info!(
            "[l2] Restoring from snapshot saved at height {} ({} blocks, {} holders)",
            snapshot.saved_at,
            snapshot.blocks.len(),
            snapshot.holders.len()
        );
        let state = SettlementState::from_snapshot(snapshot)?;
        Ok(Self::with_state(config, state, governance, verifier, height))
    }

    fn with_state(
        config: SettlementConfig,
        state: SettlementState,
        governance: Arc<G>,
        verifier: Arc<V>,
        height: Arc<H>,
    ) -> Self {
        metrics::set_exodus_active(state.exodus.is_active());
        Self {
            config,
            state: Arc::new(RwLock::new(state)),
            governance,
            verifier,
            height,
        }
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    fn context(&self) -> OperationContext<'_> {
        OperationContext {
            config: &self.config,
            governance: self.governance.as_ref(),
            verifier: self.verifier.as_ref(),
            now: self.height.current_height(),
        }
    }

    /// Log and count a rejected call, passing the result through.
    fn observe<T>(&self, operation: &str, result: SettlementResult<T>) -> SettlementResult<T> {
        if let Err(e) = &result {
            metrics::record_rejection(e.label());
            if e.is_retryable() {
                tracing::debug!("[l2] {} deferred: {}", operation, e);
            } else {
                tracing::warn!("[l2] {} rejected: {}", operation, e);
            }
        }
        result
    }

    fn update_depth(&self, state: &SettlementState) {
        metrics::set_pipeline_depth(state.pipeline.outstanding(), state.queue.unclaimed_count());
    }

    fn append(
        &self,
        kind: HolderKind,
        token: TokenId,
        owner: Address,
        amount: Amount,
    ) -> SettlementResult<u64> {
        let mut state = self.state.write();
        let result = state.append(kind, token, owner, amount);
        if let Ok(sequence) = &result {
            tracing::debug!(
                "[l2] Queued {:?} #{} of {} (token {}) for {}",
                kind,
                sequence,
                amount,
                token,
                ShortHex(&owner)
            );
            self.update_depth(&state);
        }
        self.observe("append", result)
    }
}

#[async_trait]
impl<G, V, H> SettlementApi for SettlementService<G, V, H>
where
    G: Governance + 'static,
    V: ProofVerifier + 'static,
    H: HeightSource + 'static,
{
    async fn append_deposit(
        &self,
        token: TokenId,
        owner: Address,
        amount: Amount,
    ) -> SettlementResult<u64> {
        self.append(HolderKind::Deposit, token, owner, amount)
    }

    async fn append_deposit_for_token_address(
        &self,
        token_address: Address,
        owner: Address,
        amount: Amount,
    ) -> SettlementResult<u64> {
        let token = self
            .governance
            .token_id_for(&token_address)
            .ok_or(SettlementError::UnknownToken {
                address: token_address,
            });
        let token = self.observe("append", token)?;
        self.append(HolderKind::Deposit, token, owner, amount)
    }

    async fn append_withdraw(
        &self,
        token: TokenId,
        owner: Address,
        amount: Amount,
    ) -> SettlementResult<u64> {
        self.append(HolderKind::Withdraw, token, owner, amount)
    }

    async fn commit(
        &self,
        number: BlockNumber,
        new_state_root: Hash,
        data_commitment: Hash,
        claim_count: u64,
        validator: Address,
    ) -> SettlementResult<Block> {
        let ctx = self.context();
        let mut state = self.state.write();
        let result = state.commit(&ctx, number, new_state_root, data_commitment, claim_count, validator);

        if let Ok(block) = &result {
            tracing::info!(
                "[l2] Committed block {} at height {} (holders {}..{}, root {})",
                block.number,
                block.committed_at,
                block.holder_range.start,
                block.holder_range.end,
                ShortHex(&block.new_state_root)
            );
            metrics::record_block_committed();
            self.update_depth(&state);
        }
        self.observe("commit", result)
    }

    async fn verify(
        &self,
        number: BlockNumber,
        proof: Vec<u8>,
        validator: Address,
    ) -> SettlementResult<VerifyOutcome> {
        let ctx = self.context();
        let mut state = self.state.write();
        let result = state.verify(&ctx, number, &proof, validator);

        if let Ok(outcome) = &result {
            tracing::info!(
                "[l2] Verified block {} ({} deposits, {} withdrawals, root {})",
                outcome.block,
                outcome.deposits,
                outcome.withdrawals,
                ShortHex(&outcome.new_state_root)
            );
            metrics::record_block_verified();
            self.update_depth(&state);
        }
        self.observe("verify", result)
    }

    async fn revert_expired(&self) -> SettlementResult<RevertOutcome> {
        let ctx = self.context();
        let mut state = self.state.write();
        let result = state.revert_expired(&ctx);

        if let Ok(outcome) = &result {
            if !outcome.is_empty() {
                tracing::warn!(
                    "[l2] Reverted {} block(s) at height {}: expired {:?}, invalidated {:?}",
                    outcome.reverted_count(),
                    ctx.now,
                    outcome.expired,
                    outcome.invalidated
                );
                metrics::record_blocks_reverted(outcome.expired.len(), outcome.invalidated.len());
                self.update_depth(&state);
            }
        }
        self.observe("revert_expired", result)
    }

    async fn trigger(&self, caller: Address) -> SettlementResult<ExodusActivation> {
        let ctx = self.context();
        let mut state = self.state.write();
        let result = state.trigger(&ctx, caller);

        if let Ok(activation) = &result {
            tracing::error!(
                "[l2] EXODUS TRIGGERED at height {} (last verified block {}, root {})",
                activation.triggered_at,
                activation.last_verified_block,
                ShortHex(&activation.last_verified_root)
            );
            metrics::set_exodus_active(true);
        }
        self.observe("trigger", result)
    }

    async fn exit(
        &self,
        token: TokenId,
        owners: Vec<Address>,
        amounts: Vec<Amount>,
        proof: Vec<u8>,
    ) -> SettlementResult<ExitOutcome> {
        let ctx = self.context();
        let mut state = self.state.write();
        let result = state.exit(&ctx, token, &owners, &amounts, &proof);

        if let Ok(outcome) = &result {
            tracing::info!(
                "[l2] Exit batch credited {} owner(s) of token {} ({} total)",
                outcome.owners,
                outcome.token,
                outcome.recovered
            );
            metrics::record_exit(outcome.owners);
        }
        self.observe("exit", result)
    }

    async fn drain_pending(&self, limit: u64) -> SettlementResult<DrainOutcome> {
        let mut state = self.state.write();
        let result = state.drain_pending(limit);

        if let Ok(outcome) = &result {
            tracing::info!(
                "[l2] Drained pending holders: {} refunded, {} cancelled, {} remaining",
                outcome.refunded_deposits,
                outcome.cancelled_withdrawals,
                outcome.remaining
            );
            if !outcome.unrefundable.is_empty() {
                tracing::warn!(
                    "[l2] {} deposits could not be refunded without overflow: {:?}",
                    outcome.unrefundable.len(),
                    outcome.unrefundable
                );
            }
            self.update_depth(&state);
        }
        self.observe("drain_pending", result)
    }

    async fn balance(&self, owner: Address, token: TokenId) -> BalanceEntry {
        let now = self.height.current_height();
        self.state.read().balance(&owner, token, now)
    }

    async fn block(&self, number: BlockNumber) -> Option<Block> {
        self.state.read().pipeline.block(number).cloned()
    }

    async fn block_status(&self, number: BlockNumber) -> Option<BlockStatus> {
        let now = self.height.current_height();
        self.state
            .read()
            .pipeline
            .status_of(number, now, self.config.expiry_threshold)
    }

    async fn totals(&self) -> PipelineTotals {
        self.state.read().totals()
    }

    async fn is_exodus(&self) -> bool {
        self.state.read().exodus.is_active()
    }

    async fn unclaimed_holders(&self) -> Vec<Holder> {
        self.state.read().queue.unclaimed().to_vec()
    }

    async fn liveness(&self) -> LivenessReport {
        let now = self.height.current_height();
        self.state.read().liveness(now, self.config.expiry_threshold)
    }

    async fn take_events(&self) -> Vec<SettlementEvent> {
        self.state.write().take_events()
    }

    async fn snapshot(&self) -> SettlementSnapshot {
        let now = self.height.current_height();
        self.state.read().to_snapshot(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FixedVerifier;
    use shared_types::BlockHeight;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU64, Ordering};

    const VALIDATOR: Address = [0x01; 20];
    const WATCHDOG: Address = [0xee; 20];
    const ALICE: Address = [0xa1; 20];
    const BOB: Address = [0xb0; 20];
    const USDC: Address = [0x5c; 20];

    // Mock implementations for testing
    struct MockGovernance {
        validators: HashSet<Address>,
        tokens: HashMap<Address, TokenId>,
    }

    impl MockGovernance {
        fn new() -> Self {
            Self {
                validators: [VALIDATOR].into_iter().collect(),
                tokens: [(USDC, 7)].into_iter().collect(),
            }
        }
    }

    impl Governance for MockGovernance {
        fn is_authorized_validator(&self, identity: &Address) -> bool {
            self.validators.contains(identity)
        }

        fn token_id_for(&self, token_address: &Address) -> Option<TokenId> {
            self.tokens.get(token_address).copied()
        }
    }

    struct MockHeight {
        height: AtomicU64,
    }

    impl MockHeight {
        fn set(&self, height: BlockHeight) {
            self.height.store(height, Ordering::SeqCst);
        }
    }

    impl HeightSource for MockHeight {
        fn current_height(&self) -> BlockHeight {
            self.height.load(Ordering::SeqCst)
        }
    }

    type TestService = SettlementService<MockGovernance, FixedVerifier, MockHeight>;

    fn create_service(always_valid: bool) -> (TestService, Arc<MockHeight>) {
        let height = Arc::new(MockHeight {
            height: AtomicU64::new(0),
        });
        let config = SettlementConfig::default()
            .with_expiry_threshold(10)
            .with_deposit_maturation(3)
            .with_watchdog(WATCHDOG);
        let service = SettlementService::new(
            config,
            Arc::new(MockGovernance::new()),
            Arc::new(FixedVerifier { always_valid }),
            height.clone(),
        );
        (service, height)
    }

    #[tokio::test]
    async fn test_deposit_matures_after_verification() {
        let (service, height) = create_service(true);

        service.append_deposit(0, ALICE, 100).await.unwrap();
        service.commit(1, [1; 32], [2; 32], 1, VALIDATOR).await.unwrap();

        height.set(4);
        service.verify(1, vec![0xaa], VALIDATOR).await.unwrap();

        let locked = service.balance(ALICE, 0).await;
        assert_eq!(locked.locked, 100);
        assert_eq!(locked.available, 0);

        height.set(7);
        let matured = service.balance(ALICE, 0).await;
        assert_eq!(matured.available, 100);
        assert_eq!(matured.locked, 0);
    }

    #[tokio::test]
    async fn test_deposit_by_token_address() {
        let (service, _) = create_service(true);

        service
            .append_deposit_for_token_address(USDC, ALICE, 5)
            .await
            .unwrap();
        let unclaimed = service.unclaimed_holders().await;
        assert_eq!(unclaimed[0].token, 7);

        let err = service
            .append_deposit_for_token_address([0x99; 20], ALICE, 5)
            .await
            .unwrap_err();
        assert_eq!(err, SettlementError::UnknownToken { address: [0x99; 20] });
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let (service, _) = create_service(true);

        let err = service.append_withdraw(0, ALICE, 0).await.unwrap_err();
        assert!(matches!(err, SettlementError::InvalidAmount { .. }));
        assert!(service.unclaimed_holders().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_proof_leaves_block_pending() {
        let (service, _) = create_service(false);

        service.commit(1, [1; 32], [2; 32], 0, VALIDATOR).await.unwrap();
        let err = service.verify(1, vec![], VALIDATOR).await.unwrap_err();
        assert_eq!(err, SettlementError::ProofRejected { block: 1 });
        assert_eq!(service.block_status(1).await, Some(BlockStatus::Pending));
    }

    #[tokio::test]
    async fn test_block_status_reports_expiry_and_revert() {
        let (service, height) = create_service(true);

        service.commit(1, [1; 32], [2; 32], 0, VALIDATOR).await.unwrap();
        height.set(11);
        assert_eq!(service.block_status(1).await, Some(BlockStatus::Expired));

        let liveness = service.liveness().await;
        assert!(liveness.oldest_unverified_expired);
        assert_eq!(liveness.oldest_unverified, Some(1));

        let outcome = service.revert_expired().await.unwrap();
        assert_eq!(outcome.expired, vec![1]);
        assert_eq!(service.block_status(1).await, Some(BlockStatus::Reverted));
        assert_eq!(service.block(1).await, None);
        assert_eq!(service.liveness().await.consecutive_expiry_reverts, 1);
    }

    #[tokio::test]
    async fn test_exodus_flow() {
        let (service, _) = create_service(true);

        service.append_deposit(0, BOB, 9).await.unwrap();
        let err = service.trigger(ALICE).await.unwrap_err();
        assert_eq!(err, SettlementError::Unauthorized { caller: ALICE });

        service.trigger(WATCHDOG).await.unwrap();
        assert!(service.is_exodus().await);

        service.exit(0, vec![ALICE], vec![50], vec![]).await.unwrap();
        assert_eq!(service.balance(ALICE, 0).await.available, 50);

        let err = service.exit(0, vec![ALICE], vec![50], vec![]).await.unwrap_err();
        assert_eq!(err, SettlementError::AlreadyExited { owner: ALICE, token: 0 });

        let drained = service.drain_pending(10).await.unwrap();
        assert_eq!(drained.refunded_deposits, 1);
        assert_eq!(service.balance(BOB, 0).await.available, 9);
    }

    #[tokio::test]
    async fn test_events_emitted_in_order() {
        let (service, _) = create_service(true);

        service.commit(1, [1; 32], [2; 32], 0, VALIDATOR).await.unwrap();
        service.verify(1, vec![], VALIDATOR).await.unwrap();
        service.trigger(WATCHDOG).await.unwrap();

        let names: Vec<_> = service
            .take_events()
            .await
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(names, vec!["BlockCommitted", "BlockVerified", "ExodusTriggered"]);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_through_service() {
        let (service, height) = create_service(true);

        service.append_deposit(0, ALICE, 10).await.unwrap();
        service.append_deposit(0, BOB, 20).await.unwrap();
        service.commit(1, [1; 32], [2; 32], 1, VALIDATOR).await.unwrap();
        service.verify(1, vec![], VALIDATOR).await.unwrap();
        service.commit(2, [3; 32], [4; 32], 1, VALIDATOR).await.unwrap();

        let bytes = service.snapshot().await.encode().unwrap();
        let snapshot = SettlementSnapshot::decode(&bytes).unwrap();

        let restored = SettlementService::from_snapshot(
            service.config().clone(),
            snapshot,
            Arc::new(MockGovernance::new()),
            Arc::new(FixedVerifier::accepting()),
            height.clone(),
        )
        .unwrap();

        assert_eq!(restored.totals().await, service.totals().await);
        assert_eq!(restored.balance(ALICE, 0).await, service.balance(ALICE, 0).await);

        restored.verify(2, vec![], VALIDATOR).await.unwrap();
        assert_eq!(restored.balance(BOB, 0).await.locked, 20);
    }
}

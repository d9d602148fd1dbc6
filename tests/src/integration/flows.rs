//! # Integration Test Flows
//!
//! Deposit, commit, verify, expiry and exodus scenarios driven through
//! `SettlementApi` with the digest verifier and the in-memory registry.

#[cfg(test)]
mod tests {
    use super::super::{harness, proof_for, roots, validator, watchdog, TOKEN, TOKEN_ADDRESS};
    use l2_settlement::adapters::Keccak256ProofVerifier;
    use l2_settlement::{
        BlockStatus, HolderKind, SettlementApi, SettlementConfig, SettlementError,
        SettlementService, SettlementSnapshot,
    };
    use shared_types::{address_from_byte, NATIVE_TOKEN};
    use std::sync::Arc;

    fn config() -> SettlementConfig {
        SettlementConfig::default()
            .with_expiry_threshold(20)
            .with_deposit_maturation(5)
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_deposit_commit_verify_credits_locked_balance() {
        let (service, height) = harness(config());
        let alice = address_from_byte(0xa1);

        service.append_deposit(NATIVE_TOKEN, alice, 100).await.unwrap();

        let (root, commitment) = roots(1);
        let block = service.commit(1, root, commitment, 1, validator()).await.unwrap();
        assert_eq!(block.holder_range.len(), 1);

        height.set(3);
        let outcome = service.verify(1, proof_for(1), validator()).await.unwrap();
        assert_eq!(outcome.deposits, 1);

        let entry = service.balance(alice, NATIVE_TOKEN).await;
        assert_eq!(entry.locked, 100);
        assert_eq!(entry.available, 0);

        let totals = service.totals().await;
        assert_eq!(totals.total_verified, 1);
        assert_eq!(totals.last_verified_root, root);

        height.set(8);
        assert_eq!(service.balance(alice, NATIVE_TOKEN).await.available, 100);
    }

    #[tokio::test]
    async fn test_withdraw_after_maturation() {
        let (service, height) = harness(config());
        let bob = address_from_byte(0xb0);

        service.append_deposit(TOKEN, bob, 70).await.unwrap();
        let (root, commitment) = roots(1);
        service.commit(1, root, commitment, 1, validator()).await.unwrap();
        service.verify(1, proof_for(1), validator()).await.unwrap();

        height.set(5);
        service.append_withdraw(TOKEN, bob, 30).await.unwrap();
        let (root, commitment) = roots(2);
        service.commit(2, root, commitment, 1, validator()).await.unwrap();
        let outcome = service.verify(2, proof_for(2), validator()).await.unwrap();
        assert_eq!(outcome.withdrawals, 1);

        let entry = service.balance(bob, TOKEN).await;
        assert_eq!(entry.available, 40);
        assert_eq!(entry.locked, 0);
    }

    #[tokio::test]
    async fn test_withdraw_of_locked_funds_blocks_verification() {
        let (service, _) = harness(config());
        let bob = address_from_byte(0xb0);

        service.append_deposit(TOKEN, bob, 70).await.unwrap();
        service.append_withdraw(TOKEN, bob, 10).await.unwrap();
        let (root, commitment) = roots(1);
        service.commit(1, root, commitment, 2, validator()).await.unwrap();

        // The deposit is still locked when the withdrawal is applied.
        let err = service.verify(1, proof_for(1), validator()).await.unwrap_err();
        assert!(matches!(err, SettlementError::InsufficientBalance { .. }));
        assert!(err.is_retryable());
        assert_eq!(service.balance(bob, TOKEN).await.total(), 0);
        assert_eq!(service.block_status(1).await, Some(BlockStatus::Pending));
    }

    #[tokio::test]
    async fn test_deposit_by_registered_token_address() {
        let (service, _) = harness(config());
        let alice = address_from_byte(0xa1);

        service
            .append_deposit_for_token_address(TOKEN_ADDRESS, alice, 9)
            .await
            .unwrap();
        let holders = service.unclaimed_holders().await;
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].token, TOKEN);
        assert_eq!(holders[0].kind, HolderKind::Deposit);
    }

    // =============================================================================
    // ORDERING AND PROOFS
    // =============================================================================

    #[tokio::test]
    async fn test_commit_numbers_are_sequential() {
        let (service, _) = harness(config());

        for number in 1..=3 {
            let (root, commitment) = roots(number);
            service.commit(number, root, commitment, 0, validator()).await.unwrap();
        }

        let (root, commitment) = roots(5);
        let err = service.commit(5, root, commitment, 0, validator()).await.unwrap_err();
        assert_eq!(err, SettlementError::OutOfOrder { expected: 4, actual: 5 });
        assert_eq!(service.totals().await.total_committed, 3);
    }

    #[tokio::test]
    async fn test_wrong_proof_rejected_then_correct_proof_accepted() {
        let (service, _) = harness(config());

        let (root, commitment) = roots(1);
        service.commit(1, root, commitment, 0, validator()).await.unwrap();

        let err = service.verify(1, proof_for(2), validator()).await.unwrap_err();
        assert_eq!(err, SettlementError::ProofRejected { block: 1 });

        service.verify(1, proof_for(1), validator()).await.unwrap();
        assert_eq!(service.block_status(1).await, Some(BlockStatus::Verified));
    }

    #[tokio::test]
    async fn test_unregistered_validator_rejected() {
        let (service, _) = harness(config());
        let outsider = address_from_byte(0x77);

        let (root, commitment) = roots(1);
        let err = service.commit(1, root, commitment, 0, outsider).await.unwrap_err();
        assert_eq!(err, SettlementError::Unauthorized { caller: outsider });
    }

    // =============================================================================
    // EXPIRY
    // =============================================================================

    #[tokio::test]
    async fn test_expired_block_reverted_and_holder_restored() {
        let (service, height) = harness(config());
        let alice = address_from_byte(0xa1);
        let bob = address_from_byte(0xb0);

        service.append_deposit(NATIVE_TOKEN, alice, 10).await.unwrap();
        let (root, commitment) = roots(1);
        service.commit(1, root, commitment, 1, validator()).await.unwrap();
        service.verify(1, proof_for(1), validator()).await.unwrap();

        service.append_deposit(NATIVE_TOKEN, bob, 20).await.unwrap();
        let queued = service.unclaimed_holders().await;
        assert_eq!(queued[0].sequence, 1);

        height.set(2);
        let (root, commitment) = roots(2);
        service.commit(2, root, commitment, 1, validator()).await.unwrap();

        height.set(23);
        assert_eq!(service.block_status(2).await, Some(BlockStatus::Expired));

        let outcome = service.revert_expired().await.unwrap();
        assert_eq!(outcome.expired, vec![2]);
        assert_eq!(service.totals().await.total_committed, 1);
        assert_eq!(service.unclaimed_holders().await, queued);
        assert_eq!(service.block_status(2).await, Some(BlockStatus::Reverted));

        // Block 2 can be committed again and picks up the same holder.
        let block = service.commit(2, root, commitment, 1, validator()).await.unwrap();
        assert_eq!(block.holder_range.start, 1);
    }

    #[tokio::test]
    async fn test_expired_backlog_blocks_new_commits_until_reverted() {
        let (service, height) = harness(config());

        let (root, commitment) = roots(1);
        service.commit(1, root, commitment, 0, validator()).await.unwrap();

        height.set(21);
        let (root2, commitment2) = roots(2);
        let err = service.commit(2, root2, commitment2, 0, validator()).await.unwrap_err();
        assert_eq!(err, SettlementError::ExpiredBlocksPending { block: 1 });

        let err = service.verify(1, proof_for(1), validator()).await.unwrap_err();
        assert!(matches!(err, SettlementError::BlockExpired { block: 1, .. }));

        service.revert_expired().await.unwrap();
        service.commit(1, root, commitment, 0, validator()).await.unwrap();
    }

    // =============================================================================
    // EXODUS
    // =============================================================================

    #[tokio::test]
    async fn test_exodus_halts_pipeline_and_allows_single_exit() {
        let (service, _) = harness(config());
        let alice = address_from_byte(0xa1);

        let (root, commitment) = roots(1);
        service.commit(1, root, commitment, 0, validator()).await.unwrap();
        service.verify(1, proof_for(1), validator()).await.unwrap();

        let activation = service.trigger(watchdog()).await.unwrap();
        assert_eq!(activation.last_verified_root, root);
        assert_eq!(activation.last_verified_block, 1);

        let (root2, commitment2) = roots(2);
        let err = service.commit(2, root2, commitment2, 0, validator()).await.unwrap_err();
        assert_eq!(err, SettlementError::SystemHalted);
        assert!(err.is_permanent());

        let proof = Keccak256ProofVerifier::exit_proof(NATIVE_TOKEN, &[alice], &[100], &root);
        service
            .exit(NATIVE_TOKEN, vec![alice], vec![100], proof.clone())
            .await
            .unwrap();
        assert_eq!(service.balance(alice, NATIVE_TOKEN).await.available, 100);

        let err = service
            .exit(NATIVE_TOKEN, vec![alice], vec![100], proof)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SettlementError::AlreadyExited {
                owner: alice,
                token: NATIVE_TOKEN
            }
        );
        assert_eq!(service.balance(alice, NATIVE_TOKEN).await.available, 100);
    }

    #[tokio::test]
    async fn test_exit_proof_must_match_last_verified_root() {
        let (service, _) = harness(config());
        let alice = address_from_byte(0xa1);

        service.trigger(watchdog()).await.unwrap();

        let stale = Keccak256ProofVerifier::exit_proof(NATIVE_TOKEN, &[alice], &[5], &[0xab; 32]);
        let err = service
            .exit(NATIVE_TOKEN, vec![alice], vec![5], stale)
            .await
            .unwrap_err();
        assert_eq!(err, SettlementError::ProofRejected { block: 0 });
        assert_eq!(service.balance(alice, NATIVE_TOKEN).await.available, 0);
    }

    #[tokio::test]
    async fn test_drain_refunds_unsettled_deposits_once() {
        let (service, _) = harness(config());
        let alice = address_from_byte(0xa1);
        let bob = address_from_byte(0xb0);

        service.append_deposit(NATIVE_TOKEN, alice, 11).await.unwrap();
        service.append_withdraw(NATIVE_TOKEN, bob, 3).await.unwrap();
        service.append_deposit(NATIVE_TOKEN, bob, 12).await.unwrap();
        let (root, commitment) = roots(1);
        service.commit(1, root, commitment, 2, validator()).await.unwrap();

        let err = service.drain_pending(10).await.unwrap_err();
        assert_eq!(err, SettlementError::NotInExodus);

        service.trigger(watchdog()).await.unwrap();
        let outcome = service.drain_pending(10).await.unwrap();
        assert_eq!(outcome.refunded_deposits, 2);
        assert_eq!(outcome.cancelled_withdrawals, 1);
        assert_eq!(outcome.remaining, 0);

        let again = service.drain_pending(10).await.unwrap();
        assert_eq!(again.refunded_deposits, 0);
        assert_eq!(service.balance(alice, NATIVE_TOKEN).await.available, 11);
        assert_eq!(service.balance(bob, NATIVE_TOKEN).await.available, 12);
    }

    // =============================================================================
    // EVENTS AND PERSISTENCE
    // =============================================================================

    #[tokio::test]
    async fn test_events_serialize_with_type_tag() {
        let (service, _) = harness(config());

        let (root, commitment) = roots(1);
        service.commit(1, root, commitment, 0, validator()).await.unwrap();

        let events = service.take_events().await;
        assert_eq!(events.len(), 1);
        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["type"], "BlockCommitted");
        assert_eq!(json["block"], 1);
    }

    #[tokio::test]
    async fn test_restored_snapshot_behaves_identically() {
        let (service, height) = harness(config());
        let alice = address_from_byte(0xa1);

        service.append_deposit(NATIVE_TOKEN, alice, 40).await.unwrap();
        service.append_deposit(NATIVE_TOKEN, alice, 2).await.unwrap();
        let (root, commitment) = roots(1);
        service.commit(1, root, commitment, 1, validator()).await.unwrap();

        let bytes = service.snapshot().await.encode().unwrap();
        let snapshot = SettlementSnapshot::decode(&bytes).unwrap();

        let (fresh, _) = harness(config());
        let restored = SettlementService::from_snapshot(
            fresh.config().clone(),
            snapshot,
            Arc::new(
                l2_settlement::adapters::StaticGovernance::with_validators([validator()]),
            ),
            Arc::new(Keccak256ProofVerifier),
            Arc::clone(&height),
        )
        .unwrap();

        for api in [&service, &restored] {
            api.verify(1, proof_for(1), validator()).await.unwrap();
            let (root, commitment) = roots(2);
            api.commit(2, root, commitment, 1, validator()).await.unwrap();
        }

        assert_eq!(restored.totals().await, service.totals().await);
        assert_eq!(
            restored.balance(alice, NATIVE_TOKEN).await,
            service.balance(alice, NATIVE_TOKEN).await
        );
        assert_eq!(restored.snapshot().await, service.snapshot().await);
    }
}

//! # Randomized Property Checks
//!
//! Seeded random workloads checking the pipeline's accounting invariants:
//! exactly-once application, revert round-trips and all-or-nothing verify.

#[cfg(test)]
mod tests {
    use crate::integration::{harness, proof_for, roots, validator, watchdog, TestService};
    use l2_settlement::{SettlementApi, SettlementConfig, SettlementError};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use shared_types::{address_from_byte, Address, Amount, TokenId};
    use std::collections::HashMap;

    const OWNERS: u8 = 6;
    const TOKENS: TokenId = 3;

    fn config() -> SettlementConfig {
        SettlementConfig::default()
            .with_expiry_threshold(50)
            .with_deposit_maturation(0)
    }

    async fn random_deposits(
        service: &TestService,
        rng: &mut StdRng,
        count: usize,
    ) -> Vec<(Address, TokenId, Amount)> {
        let mut queued = Vec::with_capacity(count);
        for _ in 0..count {
            let owner = address_from_byte(rng.gen_range(1..=OWNERS));
            let token = rng.gen_range(0..TOKENS);
            let amount = rng.gen_range(1..1_000u128);
            service.append_deposit(token, owner, amount).await.unwrap();
            queued.push((owner, token, amount));
        }
        queued
    }

    async fn total_of(service: &TestService, owner: Address, token: TokenId) -> Amount {
        service.balance(owner, token).await.total()
    }

    /// Commit and verify blocks of random size until the queue is empty.
    async fn settle_all(service: &TestService, rng: &mut StdRng) -> u64 {
        let mut number = service.totals().await.total_committed;
        loop {
            let unclaimed = service.totals().await.unclaimed_holders;
            if unclaimed == 0 {
                return number;
            }
            number += 1;
            let take = rng.gen_range(1..=unclaimed.min(8));
            let (root, commitment) = roots(number);
            service.commit(number, root, commitment, take, validator()).await.unwrap();
            service.verify(number, proof_for(number), validator()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_every_deposit_applied_exactly_once() {
        for seed in 0..8u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let (service, _) = harness(config());

            let queued = random_deposits(&service, &mut rng, 40).await;
            let blocks = settle_all(&service, &mut rng).await;

            let mut expected: HashMap<(Address, TokenId), Amount> = HashMap::new();
            for (owner, token, amount) in &queued {
                *expected.entry((*owner, *token)).or_default() += amount;
            }
            for ((owner, token), amount) in expected {
                assert_eq!(total_of(&service, owner, token).await, amount, "seed {seed}");
            }

            let totals = service.totals().await;
            assert_eq!(totals.total_verified, blocks);
            assert_eq!(totals.unsettled_holders, 0);
        }
    }

    #[tokio::test]
    async fn test_random_withdrawals_never_overdraw() {
        let mut rng = StdRng::seed_from_u64(42);
        let (service, _) = harness(config());

        random_deposits(&service, &mut rng, 30).await;
        settle_all(&service, &mut rng).await;

        let mut before = HashMap::new();
        for owner in 1..=OWNERS {
            for token in 0..TOKENS {
                let owner = address_from_byte(owner);
                before.insert((owner, token), total_of(&service, owner, token).await);
            }
        }

        // Withdraw a random share of each funded balance.
        let mut withdrawn: HashMap<(Address, TokenId), Amount> = HashMap::new();
        for (&(owner, token), &balance) in &before {
            if balance == 0 {
                continue;
            }
            let amount = rng.gen_range(1..=balance);
            service.append_withdraw(token, owner, amount).await.unwrap();
            withdrawn.insert((owner, token), amount);
        }
        settle_all(&service, &mut rng).await;

        for ((owner, token), balance) in before {
            let taken = withdrawn.get(&(owner, token)).copied().unwrap_or(0);
            assert_eq!(total_of(&service, owner, token).await, balance - taken);
        }
    }

    #[tokio::test]
    async fn test_commit_then_revert_restores_unclaimed_queue() {
        for seed in 0..6u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let (service, height) = harness(config());

            random_deposits(&service, &mut rng, 20).await;
            let before = service.unclaimed_holders().await;

            let blocks = rng.gen_range(1..=4u64);
            for number in 1..=blocks {
                let unclaimed = service.totals().await.unclaimed_holders;
                let take = rng.gen_range(0..=unclaimed.min(5));
                let (root, commitment) = roots(number);
                service.commit(number, root, commitment, take, validator()).await.unwrap();
                height.advance(rng.gen_range(0..10));
            }

            height.advance(51);
            let outcome = service.revert_expired().await.unwrap();
            assert_eq!(outcome.reverted_count() as u64, blocks, "seed {seed}");
            assert_eq!(service.unclaimed_holders().await, before, "seed {seed}");
            assert_eq!(service.totals().await.total_committed, 0);
        }
    }

    #[tokio::test]
    async fn test_failed_verify_changes_nothing() {
        let mut rng = StdRng::seed_from_u64(7);
        let (service, _) = harness(config());

        let queued = random_deposits(&service, &mut rng, 10).await;
        settle_all(&service, &mut rng).await;
        let snapshot_before = service.snapshot().await;

        // Overdraw the first owner in the middle of an otherwise valid block.
        let (owner, token, _) = queued[0];
        let balance = total_of(&service, owner, token).await;
        let other = address_from_byte(OWNERS + 1);
        service.append_deposit(token, other, 5).await.unwrap();
        service.append_withdraw(token, owner, balance + 1).await.unwrap();
        service.append_deposit(token, other, 6).await.unwrap();

        let number = snapshot_before.total_verified + 1;
        let (root, commitment) = roots(number);
        service.commit(number, root, commitment, 3, validator()).await.unwrap();

        let err = service.verify(number, proof_for(number), validator()).await.unwrap_err();
        assert!(matches!(err, SettlementError::InsufficientBalance { .. }));

        let after = service.snapshot().await;
        assert_eq!(after.balances, snapshot_before.balances);
        assert_eq!(after.total_verified, snapshot_before.total_verified);
        assert_eq!(total_of(&service, other, token).await, 0);
    }

    #[tokio::test]
    async fn test_exit_credits_each_owner_once_under_random_batches() {
        let mut rng = StdRng::seed_from_u64(99);
        let (service, _) = harness(config());
        service.trigger(watchdog()).await.unwrap();
        let root = service.totals().await.last_verified_root;

        let mut credited: HashMap<Address, Amount> = HashMap::new();
        for _ in 0..30 {
            let size = rng.gen_range(1..=3usize);
            let owners: Vec<Address> = (0..size)
                .map(|_| address_from_byte(rng.gen_range(1..=OWNERS)))
                .collect();
            let amounts: Vec<Amount> = (0..size).map(|_| rng.gen_range(1..100u128)).collect();
            let proof = l2_settlement::adapters::Keccak256ProofVerifier::exit_proof(
                0, &owners, &amounts, &root,
            );

            match service.exit(0, owners.clone(), amounts.clone(), proof).await {
                Ok(_) => {
                    for (owner, amount) in owners.iter().zip(&amounts) {
                        assert!(credited.insert(*owner, *amount).is_none());
                    }
                }
                Err(SettlementError::AlreadyExited { .. }) => {}
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }

        for (owner, amount) in credited {
            assert_eq!(service.balance(owner, 0).await.available, amount);
        }
    }
}

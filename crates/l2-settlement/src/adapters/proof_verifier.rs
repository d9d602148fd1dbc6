//! Proof Verifier Adapters
//!
//! `Keccak256ProofVerifier` accepts a proof that is the Keccak-256 digest of
//! the statement it proves. It binds proofs to their inputs without any
//! zero-knowledge machinery, which is enough for devnets and tests.

use crate::ports::outbound::ProofVerifier;
use sha3::{Digest, Keccak256};
use shared_types::{Address, Amount, Hash, TokenId};
use tracing::debug;

const BLOCK_DOMAIN: &[u8] = b"l2/block";
const EXIT_DOMAIN: &[u8] = b"l2/exit";

/// Digest-commitment verifier
#[derive(Clone, Copy, Debug, Default)]
pub struct Keccak256ProofVerifier;

impl Keccak256ProofVerifier {
    /// The proof this verifier accepts for a block.
    pub fn block_proof(data_commitment: &Hash, new_state_root: &Hash) -> Vec<u8> {
        let mut hasher = Keccak256::new();
        hasher.update(BLOCK_DOMAIN);
        hasher.update(data_commitment);
        hasher.update(new_state_root);
        hasher.finalize().to_vec()
    }

    /// The proof this verifier accepts for an exit batch.
    pub fn exit_proof(
        token: TokenId,
        owners: &[Address],
        amounts: &[Amount],
        last_state_root: &Hash,
    ) -> Vec<u8> {
        let mut hasher = Keccak256::new();
        hasher.update(EXIT_DOMAIN);
        hasher.update(token.to_be_bytes());
        for (owner, amount) in owners.iter().zip(amounts) {
            hasher.update(owner);
            hasher.update(amount.to_be_bytes());
        }
        hasher.update(last_state_root);
        hasher.finalize().to_vec()
    }
}

impl ProofVerifier for Keccak256ProofVerifier {
    fn verify_block_proof(&self, data_commitment: &Hash, new_state_root: &Hash, proof: &[u8]) -> bool {
        let ok = proof == Self::block_proof(data_commitment, new_state_root).as_slice();
        if !ok {
            debug!("[l2] Block proof digest mismatch");
        }
        ok
    }

    fn verify_exit_proof(
        &self,
        token: TokenId,
        owners: &[Address],
        amounts: &[Amount],
        last_state_root: &Hash,
        proof: &[u8],
    ) -> bool {
        if owners.len() != amounts.len() {
            return false;
        }
        let ok = proof == Self::exit_proof(token, owners, amounts, last_state_root).as_slice();
        if !ok {
            debug!("[l2] Exit proof digest mismatch for token {}", token);
        }
        ok
    }
}

/// Verifier with a fixed answer, for tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedVerifier {
    pub always_valid: bool,
}

impl FixedVerifier {
    pub fn accepting() -> Self {
        Self { always_valid: true }
    }

    pub fn rejecting() -> Self {
        Self {
            always_valid: false,
        }
    }
}

impl ProofVerifier for FixedVerifier {
    fn verify_block_proof(&self, _: &Hash, _: &Hash, _: &[u8]) -> bool {
        self.always_valid
    }

    fn verify_exit_proof(&self, _: TokenId, _: &[Address], _: &[Amount], _: &Hash, _: &[u8]) -> bool {
        self.always_valid
    }
}

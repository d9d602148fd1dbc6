//! Driven Ports (SPI - Outbound Dependencies)
//!
//! Collaborators the coordinator consults but does not own. All of them are
//! synchronous and side-effect free from the coordinator's point of view, so
//! they may be called while the coordinator state is locked.

use shared_types::{Address, Amount, BlockHeight, Hash, TokenId};

/// Token and validator registry
pub trait Governance: Send + Sync {
    /// Whether `identity` may commit and verify blocks.
    fn is_authorized_validator(&self, identity: &Address) -> bool;

    /// Token id assigned to a root-chain token address.
    fn token_id_for(&self, token_address: &Address) -> Option<TokenId>;
}

/// Opaque proof verifier
///
/// Deterministic given its inputs. Implementations never call back into the
/// coordinator.
pub trait ProofVerifier: Send + Sync {
    /// Verify a block's state transition proof.
    fn verify_block_proof(&self, data_commitment: &Hash, new_state_root: &Hash, proof: &[u8])
        -> bool;

    /// Verify that the claimed exit amounts match the last verified state root.
    fn verify_exit_proof(
        &self,
        token: TokenId,
        owners: &[Address],
        amounts: &[Amount],
        last_state_root: &Hash,
        proof: &[u8],
    ) -> bool;
}

/// Root-chain height provider
///
/// Abstracted to allow testing with deterministic heights.
pub trait HeightSource: Send + Sync {
    fn current_height(&self) -> BlockHeight;
}

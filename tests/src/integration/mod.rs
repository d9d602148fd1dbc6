//! Cross-component scenarios run against the real adapters.

pub mod flows;
pub mod properties;

use l2_settlement::adapters::{Keccak256ProofVerifier, ManualHeightSource, StaticGovernance};
use l2_settlement::{SettlementConfig, SettlementService};
use shared_types::{address_from_byte, Address, Hash};
use std::sync::Arc;

pub type TestService =
    SettlementService<StaticGovernance, Keccak256ProofVerifier, ManualHeightSource>;

pub const TOKEN_ADDRESS: Address = [0x5c; 20];
pub const TOKEN: u32 = 1;

pub fn validator() -> Address {
    address_from_byte(0x01)
}

pub fn watchdog() -> Address {
    address_from_byte(0xee)
}

/// Service wired to the in-process adapters, starting at height 0.
pub fn harness(config: SettlementConfig) -> (TestService, Arc<ManualHeightSource>) {
    let height = Arc::new(ManualHeightSource::new(0));
    let governance = StaticGovernance::with_validators([validator()]).with_token(TOKEN_ADDRESS, TOKEN);
    let service = SettlementService::new(
        config.with_watchdog(watchdog()),
        Arc::new(governance),
        Arc::new(Keccak256ProofVerifier),
        Arc::clone(&height),
    );
    (service, height)
}

/// Deterministic per-block roots.
pub fn roots(number: u64) -> (Hash, Hash) {
    let mut state_root = [0u8; 32];
    state_root[..8].copy_from_slice(&number.to_be_bytes());
    let mut commitment = state_root;
    commitment[31] = 0xc0;
    (state_root, commitment)
}

pub fn proof_for(number: u64) -> Vec<u8> {
    let (state_root, commitment) = roots(number);
    Keccak256ProofVerifier::block_proof(&commitment, &state_root)
}

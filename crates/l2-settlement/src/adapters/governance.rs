//! Governance Adapter
//!
//! In-process validator and token registry. Admission changes take effect
//! on the next call that consults the registry.

use crate::ports::outbound::Governance;
use parking_lot::RwLock;
use shared_types::{Address, ShortHex, TokenId, NATIVE_TOKEN};
use std::collections::{HashMap, HashSet};
use tracing::info;

#[derive(Debug, Default)]
struct Registry {
    validators: HashSet<Address>,
    tokens: HashMap<Address, TokenId>,
}

/// Registry held in memory, seeded from configuration.
#[derive(Debug, Default)]
pub struct StaticGovernance {
    registry: RwLock<Registry>,
}

impl StaticGovernance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with an initial validator set.
    pub fn with_validators(validators: impl IntoIterator<Item = Address>) -> Self {
        let governance = Self::new();
        governance.registry.write().validators.extend(validators);
        governance
    }

    /// Builder-style token registration.
    pub fn with_token(self, token_address: Address, token: TokenId) -> Self {
        self.register_token(token_address, token);
        self
    }

    pub fn admit_validator(&self, validator: Address) {
        if self.registry.write().validators.insert(validator) {
            info!("[l2] Validator {} admitted", ShortHex(&validator));
        }
    }

    pub fn remove_validator(&self, validator: &Address) {
        if self.registry.write().validators.remove(validator) {
            info!("[l2] Validator {} removed", ShortHex(validator));
        }
    }

    /// Map a root-chain token address to `token`. The native token id is
    /// never assigned to an address.
    pub fn register_token(&self, token_address: Address, token: TokenId) -> bool {
        if token == NATIVE_TOKEN {
            return false;
        }
        self.registry.write().tokens.insert(token_address, token);
        true
    }

    pub fn validator_count(&self) -> usize {
        self.registry.read().validators.len()
    }
}

impl Governance for StaticGovernance {
    fn is_authorized_validator(&self, identity: &Address) -> bool {
        self.registry.read().validators.contains(identity)
    }

    fn token_id_for(&self, token_address: &Address) -> Option<TokenId> {
        self.registry.read().tokens.get(token_address).copied()
    }
}

use serde::{Deserialize, Serialize};
use shared_types::{Address, BlockHeight, Hash, ZERO_HASH};

/// Settlement coordinator configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Root-chain blocks a committed block may stay unverified before it expires
    pub expiry_threshold: BlockHeight,
    /// Maximum committed-but-unverified blocks outstanding at once
    pub max_unverified_blocks: u64,
    /// Root-chain blocks a verified deposit stays locked before it becomes available
    pub deposit_maturation: BlockHeight,
    /// The only identity allowed to trigger exodus
    pub watchdog: Address,
    /// State root of block 0
    pub genesis_state_root: Hash,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            expiry_threshold: 300,
            max_unverified_blocks: 64,
            deposit_maturation: 10,
            watchdog: [0xffu8; 20],
            genesis_state_root: ZERO_HASH,
        }
    }
}

impl SettlementConfig {
    /// Builder-style override for the expiry threshold.
    pub fn with_expiry_threshold(mut self, expiry_threshold: BlockHeight) -> Self {
        self.expiry_threshold = expiry_threshold;
        self
    }

    pub fn with_watchdog(mut self, watchdog: Address) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn with_deposit_maturation(mut self, deposit_maturation: BlockHeight) -> Self {
        self.deposit_maturation = deposit_maturation;
        self
    }

    pub fn with_max_unverified_blocks(mut self, max_unverified_blocks: u64) -> Self {
        self.max_unverified_blocks = max_unverified_blocks;
        self
    }

    pub fn with_genesis_state_root(mut self, root: Hash) -> Self {
        self.genesis_state_root = root;
        self
    }
}

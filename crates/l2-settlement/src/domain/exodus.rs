//! Exodus latch and exit registry
//!
//! ```text
//! [NORMAL] ──trigger (watchdog)──→ [EXODUS]
//! ```
//!
//! There is no edge back to `Normal`: [`ExodusMode`] only exposes a forward
//! transition, and the activation record is fixed at trigger time.

use super::balance_ledger::BalanceKey;
use crate::error::{SettlementError, SettlementResult};
use serde::{Deserialize, Serialize};
use shared_types::{Address, BlockHeight, Hash, TokenId};
use std::collections::HashSet;

/// Facts captured when exodus starts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExodusActivation {
    /// Root-chain height of the trigger
    pub triggered_at: BlockHeight,
    /// State root every exit proof is checked against
    pub last_verified_root: Hash,
    /// Blocks verified before the halt
    pub last_verified_block: u64,
}

/// One-way operating mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExodusMode {
    #[default]
    Normal,
    Exodus(ExodusActivation),
}

impl ExodusMode {
    /// Move `Normal` → `Exodus`. Fails if already active.
    pub fn trigger(&mut self, activation: ExodusActivation) -> SettlementResult<ExodusActivation> {
        match self {
            ExodusMode::Normal => {
                *self = ExodusMode::Exodus(activation);
                Ok(activation)
            }
            ExodusMode::Exodus(_) => Err(SettlementError::AlreadyTriggered),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ExodusMode::Exodus(_))
    }

    pub fn activation(&self) -> Option<&ExodusActivation> {
        match self {
            ExodusMode::Normal => None,
            ExodusMode::Exodus(activation) => Some(activation),
        }
    }

    /// Fail with `SystemHalted` once exodus is active.
    pub fn ensure_normal(&self) -> SettlementResult<()> {
        if self.is_active() {
            return Err(SettlementError::SystemHalted);
        }
        Ok(())
    }

    /// Activation record, or `NotInExodus`.
    pub fn ensure_exodus(&self) -> SettlementResult<ExodusActivation> {
        self.activation().copied().ok_or(SettlementError::NotInExodus)
    }
}

/// Exodus controller state: the latch plus the exited set
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExodusController {
    mode: ExodusMode,
    exited: HashSet<BalanceKey>,
}

impl ExodusController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(mode: ExodusMode, exited: impl IntoIterator<Item = BalanceKey>) -> Self {
        Self {
            mode,
            exited: exited.into_iter().collect(),
        }
    }

    pub fn mode(&self) -> &ExodusMode {
        &self.mode
    }

    /// Enter exodus. The controller never hands out `&mut ExodusMode`, so
    /// this is the only transition it can make.
    pub fn trigger(&mut self, activation: ExodusActivation) -> SettlementResult<ExodusActivation> {
        self.mode.trigger(activation)
    }

    pub fn is_active(&self) -> bool {
        self.mode.is_active()
    }

    pub fn has_exited(&self, owner: &Address, token: TokenId) -> bool {
        self.exited.contains(&(*owner, token))
    }

    /// Check a whole batch before any mutation.
    ///
    /// An owner appearing twice in the same batch counts as already exited.
    pub fn check_batch(&self, token: TokenId, owners: &[Address]) -> SettlementResult<()> {
        let mut seen = HashSet::with_capacity(owners.len());
        for owner in owners {
            if self.has_exited(owner, token) || !seen.insert(*owner) {
                return Err(SettlementError::AlreadyExited {
                    owner: *owner,
                    token,
                });
            }
        }
        Ok(())
    }

    /// Record a checked batch as exited.
    pub fn mark_exited(&mut self, token: TokenId, owners: &[Address]) {
        for owner in owners {
            let fresh = self.exited.insert((*owner, token));
            debug_assert!(fresh, "batch must be checked before marking");
        }
    }

    pub fn exited(&self) -> impl Iterator<Item = &BalanceKey> {
        self.exited.iter()
    }
}

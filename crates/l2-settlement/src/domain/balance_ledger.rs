//! Balance Ledger
//!
//! Per-(owner, token) custody balances with time-locked amounts.
//!
//! ```text
//! credit ──→ [locked, locked_until] ──height ≥ locked_until──→ [available] ──debit──→ out
//!                                                                   ↑
//!                                             credit_recovered ─────┘ (exodus only)
//! ```
//!
//! Unlocking is lazy: every read or write first matures the entry against the
//! current height. Multi-step mutations go through [`LedgerBatch`], which
//! applies every change to an overlay and writes it back only on `commit`.

use crate::error::{SettlementError, SettlementResult};
use serde::{Deserialize, Serialize};
use shared_types::{Address, Amount, BlockHeight, TokenId};
use std::collections::HashMap;

/// Key of a balance entry
pub type BalanceKey = (Address, TokenId);

/// Custody balance of one owner in one token
///
/// INVARIANT: `locked == 0` implies `locked_until == 0`
/// INVARIANT: `available + locked` never exceeds `Amount::MAX`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    /// Spendable amount
    pub available: Amount,
    /// Amount waiting for maturation
    pub locked: Amount,
    /// Height at which `locked` becomes available
    pub locked_until: BlockHeight,
}

impl BalanceEntry {
    /// Sum of available and locked funds.
    pub fn total(&self) -> Amount {
        // Cannot overflow: every mutation keeps the sum representable.
        self.available + self.locked
    }

    /// Entry as seen at `now`, with matured funds moved to `available`.
    pub fn matured(mut self, now: BlockHeight) -> Self {
        if self.locked > 0 && now >= self.locked_until {
            self.available += self.locked;
            self.locked = 0;
            self.locked_until = 0;
        }
        self
    }

    fn is_empty(&self) -> bool {
        self.available == 0 && self.locked == 0
    }
}

/// Owned store of all custody balances
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceLedger {
    entries: HashMap<BalanceKey, BalanceEntry>,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (BalanceKey, BalanceEntry)>) -> Self {
        let mut ledger = Self::new();
        for (key, entry) in entries {
            ledger.put(key, entry);
        }
        ledger
    }

    /// Effective balance at `now` (matured view, no mutation).
    pub fn balance(&self, owner: &Address, token: TokenId, now: BlockHeight) -> BalanceEntry {
        self.raw(&(*owner, token)).matured(now)
    }

    /// Available plus locked, independent of maturation.
    pub fn total(&self, owner: &Address, token: TokenId) -> Amount {
        self.raw(&(*owner, token)).total()
    }

    /// Add `amount` to the locked portion, maturing at `lock_until`.
    pub fn credit(
        &mut self,
        owner: &Address,
        token: TokenId,
        amount: Amount,
        lock_until: BlockHeight,
        now: BlockHeight,
    ) -> SettlementResult<()> {
        let mut batch = self.stage();
        batch.credit(owner, token, amount, lock_until, now)?;
        batch.commit();
        Ok(())
    }

    /// Move matured locked funds to available. Returns the amount unlocked.
    pub fn unlock(&mut self, owner: &Address, token: TokenId, now: BlockHeight) -> Amount {
        let key = (*owner, token);
        let before = self.raw(&key);
        let after = before.matured(now);
        self.put(key, after);
        after.available - before.available
    }

    /// Remove `amount` from available funds.
    pub fn debit(
        &mut self,
        owner: &Address,
        token: TokenId,
        amount: Amount,
        now: BlockHeight,
    ) -> SettlementResult<()> {
        let mut batch = self.stage();
        batch.debit(owner, token, amount, now)?;
        batch.commit();
        Ok(())
    }

    /// Add `amount` straight to available funds, bypassing the pipeline.
    pub fn credit_recovered(
        &mut self,
        owner: &Address,
        token: TokenId,
        amount: Amount,
    ) -> SettlementResult<()> {
        let mut batch = self.stage();
        batch.credit_recovered(owner, token, amount)?;
        batch.commit();
        Ok(())
    }

    /// Start an all-or-nothing batch of mutations.
    pub fn stage(&mut self) -> LedgerBatch<'_> {
        LedgerBatch {
            ledger: self,
            overlay: HashMap::new(),
        }
    }

    /// Iterate stored entries (non-empty only).
    pub fn entries(&self) -> impl Iterator<Item = (&BalanceKey, &BalanceEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn raw(&self, key: &BalanceKey) -> BalanceEntry {
        self.entries.get(key).copied().unwrap_or_default()
    }

    fn put(&mut self, key: BalanceKey, entry: BalanceEntry) {
        if entry.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, entry);
        }
    }
}

/// Staged ledger mutations
///
/// Dropping the batch discards every change; `commit` writes all of them.
pub struct LedgerBatch<'a> {
    ledger: &'a mut BalanceLedger,
    overlay: HashMap<BalanceKey, BalanceEntry>,
}

impl LedgerBatch<'_> {
    fn current(&self, key: &BalanceKey) -> BalanceEntry {
        self.overlay
            .get(key)
            .copied()
            .unwrap_or_else(|| self.ledger.raw(key))
    }

    /// Staged view of a balance at `now`.
    pub fn balance(&self, owner: &Address, token: TokenId, now: BlockHeight) -> BalanceEntry {
        self.current(&(*owner, token)).matured(now)
    }

    pub fn credit(
        &mut self,
        owner: &Address,
        token: TokenId,
        amount: Amount,
        lock_until: BlockHeight,
        now: BlockHeight,
    ) -> SettlementResult<()> {
        let key = (*owner, token);
        let mut entry = self.current(&key).matured(now);

        let overflow = || SettlementError::Overflow {
            owner: *owner,
            token,
        };
        entry.total().checked_add(amount).ok_or_else(overflow)?;
        entry.locked = entry.locked.checked_add(amount).ok_or_else(overflow)?;
        if amount > 0 {
            entry.locked_until = entry.locked_until.max(lock_until);
        }
        let entry = entry.matured(now);

        self.overlay.insert(key, entry);
        Ok(())
    }

    pub fn debit(
        &mut self,
        owner: &Address,
        token: TokenId,
        amount: Amount,
        now: BlockHeight,
    ) -> SettlementResult<()> {
        let key = (*owner, token);
        let mut entry = self.current(&key).matured(now);

        if entry.available < amount {
            return Err(SettlementError::InsufficientBalance {
                owner: *owner,
                token,
                required: amount,
                available: entry.available,
            });
        }
        entry.available -= amount;

        self.overlay.insert(key, entry);
        Ok(())
    }

    pub fn credit_recovered(
        &mut self,
        owner: &Address,
        token: TokenId,
        amount: Amount,
    ) -> SettlementResult<()> {
        let key = (*owner, token);
        let mut entry = self.current(&key);

        let overflow = || SettlementError::Overflow {
            owner: *owner,
            token,
        };
        entry.total().checked_add(amount).ok_or_else(overflow)?;
        entry.available = entry.available.checked_add(amount).ok_or_else(overflow)?;

        self.overlay.insert(key, entry);
        Ok(())
    }

    /// Write every staged entry back to the ledger.
    pub fn commit(self) {
        let LedgerBatch { ledger, overlay } = self;
        for (key, entry) in overlay {
            ledger.put(key, entry);
        }
    }
}

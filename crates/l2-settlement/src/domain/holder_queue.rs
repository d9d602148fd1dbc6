//! Holder Queue
//!
//! Append-only, globally indexed queue of pending deposits and withdrawals.
//!
//! ```text
//!  sequence:  0   1   2   3   4   5   6   7
//!            [S] [S] [C] [C] [C] [U] [U] [U]
//!                     ↑           ↑
//!             settled_through   cursor
//!
//!  S = settled (applied by a verified block, or drained in exodus)
//!  C = claimed by a committed, unverified block
//!  U = unclaimed
//! ```
//!
//! Claims take from the cursor, releases hand the tail of the claimed region
//! back, settles consume from the front. A holder therefore moves through the
//! regions in sequence order and is consumed exactly once.

use super::balance_ledger::BalanceKey;
use crate::error::{SettlementError, SettlementResult};
use serde::{Deserialize, Serialize};
use shared_types::{Address, Amount, TokenId};
use std::collections::HashMap;

/// Kind of pending operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HolderKind {
    Deposit,
    Withdraw,
}

/// A pending operation awaiting settlement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    /// Global sequence index
    pub sequence: u64,
    pub kind: HolderKind,
    pub token: TokenId,
    pub owner: Address,
    pub amount: Amount,
}

/// Half-open range `[start, end)` of holder sequence indices
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolderRange {
    pub start: u64,
    pub end: u64,
}

impl HolderRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Queue of pending operations
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HolderQueue {
    holders: Vec<Holder>,
    /// First unclaimed sequence
    cursor: u64,
    /// First sequence not yet consumed
    settled_through: u64,
    /// Unsettled deposit totals, used to keep future credits representable
    pending_deposits: HashMap<BalanceKey, Amount>,
}

impl HolderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from persisted parts.
    pub fn restore(holders: Vec<Holder>, cursor: u64, settled_through: u64) -> Self {
        let mut queue = Self {
            holders,
            cursor,
            settled_through,
            pending_deposits: HashMap::new(),
        };
        let start = settled_through as usize;
        for holder in queue.holders.iter().skip(start) {
            if holder.kind == HolderKind::Deposit {
                *queue
                    .pending_deposits
                    .entry((holder.owner, holder.token))
                    .or_default() += holder.amount;
            }
        }
        queue
    }

    /// Append a pending operation and return its sequence index.
    ///
    /// `settled_total` is the owner's current ledger total in `token`; a
    /// deposit is refused when it, together with every other unsettled
    /// deposit for the same owner, could no longer be represented.
    pub fn append(
        &mut self,
        kind: HolderKind,
        token: TokenId,
        owner: Address,
        amount: Amount,
        settled_total: Amount,
    ) -> SettlementResult<u64> {
        if amount == 0 {
            return Err(SettlementError::InvalidAmount {
                reason: "amount must be non-zero".into(),
            });
        }

        if kind == HolderKind::Deposit {
            let pending = self.pending_deposit_total(&owner, token);
            let fits = settled_total
                .checked_add(pending)
                .and_then(|sum| sum.checked_add(amount))
                .is_some();
            if !fits {
                return Err(SettlementError::InvalidAmount {
                    reason: format!("deposit of {amount} would overflow the balance"),
                });
            }
            *self.pending_deposits.entry((owner, token)).or_default() += amount;
        }

        let sequence = self.holders.len() as u64;
        self.holders.push(Holder {
            sequence,
            kind,
            token,
            owner,
            amount,
        });
        Ok(sequence)
    }

    /// Reserve the next `count` unclaimed holders.
    pub fn claim(&mut self, count: u64) -> SettlementResult<HolderRange> {
        let available = self.unclaimed_count();
        if available < count {
            return Err(SettlementError::InsufficientHolders {
                requested: count,
                available,
            });
        }
        let range = HolderRange::new(self.cursor, self.cursor + count);
        self.cursor = range.end;
        Ok(range)
    }

    /// Hand the tail of the claimed region back to the unclaimed region.
    ///
    /// Ranges must be released newest first.
    pub fn release(&mut self, range: HolderRange) {
        debug_assert_eq!(range.end, self.cursor, "release must target the claimed tail");
        debug_assert!(range.start >= self.settled_through);
        self.cursor = range.start;
    }

    /// Consume a verified block's range. Ranges settle strictly in order.
    pub fn settle(&mut self, range: HolderRange) {
        debug_assert_eq!(range.start, self.settled_through, "settle out of order");
        debug_assert!(range.end <= self.cursor);
        for sequence in range.start..range.end {
            let holder = &self.holders[sequence as usize];
            if holder.kind == HolderKind::Deposit {
                let key = (holder.owner, holder.token);
                Self::reduce_pending(&mut self.pending_deposits, key, holder.amount);
            }
        }
        self.settled_through = range.end;
    }

    /// Consume up to `limit` unsettled holders regardless of claim state.
    ///
    /// Used once exodus is active; claimed ranges of blocks that will never
    /// verify are drained too.
    pub fn drain_unsettled(&mut self, limit: u64) -> Vec<Holder> {
        let start = self.settled_through;
        let end = (start + limit).min(self.holders.len() as u64);
        let drained: Vec<Holder> = self.holders[start as usize..end as usize].to_vec();
        for holder in &drained {
            if holder.kind == HolderKind::Deposit {
                let key = (holder.owner, holder.token);
                Self::reduce_pending(&mut self.pending_deposits, key, holder.amount);
            }
        }
        self.settled_through = end;
        self.cursor = self.cursor.max(end);
        drained
    }

    fn reduce_pending(pending: &mut HashMap<BalanceKey, Amount>, key: BalanceKey, amount: Amount) {
        if let Some(total) = pending.get_mut(&key) {
            *total = total.saturating_sub(amount);
            if *total == 0 {
                pending.remove(&key);
            }
        }
    }

    /// Holders in `range`, in sequence order.
    pub fn holders_in(&self, range: HolderRange) -> &[Holder] {
        &self.holders[range.start as usize..range.end as usize]
    }

    /// Unclaimed holders, in the order they will be claimed.
    pub fn unclaimed(&self) -> &[Holder] {
        &self.holders[self.cursor as usize..]
    }

    pub fn holder(&self, sequence: u64) -> Option<&Holder> {
        self.holders.get(sequence as usize)
    }

    pub fn all(&self) -> &[Holder] {
        &self.holders
    }

    pub fn pending_deposit_total(&self, owner: &Address, token: TokenId) -> Amount {
        self.pending_deposits
            .get(&(*owner, token))
            .copied()
            .unwrap_or(0)
    }

    pub fn unclaimed_count(&self) -> u64 {
        self.holders.len() as u64 - self.cursor
    }

    pub fn unsettled_count(&self) -> u64 {
        self.holders.len() as u64 - self.settled_through
    }

    pub fn len(&self) -> u64 {
        self.holders.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn settled_through(&self) -> u64 {
        self.settled_through
    }
}

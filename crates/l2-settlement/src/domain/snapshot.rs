//! # Coordinator Snapshot
//!
//! Persisted layout of the four owned data sets: balances, holders, blocks
//! and exodus state.
//!
//! ## Format
//!
//! `[MAGIC (8 bytes)][bincode(SettlementSnapshot)]`
//!
//! Collections are sorted before encoding, so two equal coordinators always
//! produce identical bytes.
//!
//! ## Integrity
//!
//! A decoded snapshot is checked for internal consistency before it is
//! handed out. The checks cover the relations every live coordinator keeps:
//!
//! - `holders[i].sequence == i`
//! - `settled_through <= cursor <= holders.len()`
//! - `blocks[i].number == i + 1`, verified prefix then pending suffix
//! - block holder ranges are contiguous from 0 and end at or before the cursor
//! - outside exodus, the settled and claimed regions match the blocks exactly

use super::balance_ledger::{BalanceEntry, BalanceKey};
use super::block_pipeline::{Block, BlockStatus};
use super::exodus::ExodusMode;
use super::holder_queue::{Holder, HolderKind};
use crate::error::{SettlementError, SettlementResult};
use serde::{Deserialize, Serialize};
use shared_types::{Amount, BlockHeight, Hash};
use std::collections::{HashMap, HashSet};

/// Magic bytes for snapshot files
const SNAPSHOT_MAGIC: &[u8; 8] = b"L2SETL\x00\x01";

/// Everything needed to rebuild a coordinator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSnapshot {
    /// Root-chain height when the snapshot was taken
    pub saved_at: BlockHeight,
    pub balances: Vec<(BalanceKey, BalanceEntry)>,
    pub holders: Vec<Holder>,
    pub holder_cursor: u64,
    pub holders_settled_through: u64,
    pub blocks: Vec<Block>,
    pub total_verified: u64,
    pub last_verified_root: Hash,
    pub reverted_blocks: Vec<Block>,
    pub consecutive_expiry_reverts: u64,
    pub exodus: ExodusMode,
    pub exited: Vec<BalanceKey>,
}

impl SettlementSnapshot {
    /// Sort unordered collections so encoding is deterministic.
    pub fn normalized(mut self) -> Self {
        self.balances.sort_by(|a, b| a.0.cmp(&b.0));
        self.exited.sort();
        self
    }

    pub fn encode(&self) -> SettlementResult<Vec<u8>> {
        let body = bincode::serialize(self).map_err(|e| SettlementError::Snapshot {
            reason: e.to_string(),
        })?;
        let mut buf = Vec::with_capacity(SNAPSHOT_MAGIC.len() + body.len());
        buf.extend_from_slice(SNAPSHOT_MAGIC);
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Decode and validate.
    pub fn decode(data: &[u8]) -> SettlementResult<Self> {
        let body = data
            .strip_prefix(SNAPSHOT_MAGIC.as_slice())
            .ok_or_else(|| corrupt("invalid magic"))?;
        let snapshot: Self = bincode::deserialize(body).map_err(|e| SettlementError::Snapshot {
            reason: e.to_string(),
        })?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check that the parts describe a state a coordinator could have reached.
    pub fn validate(&self) -> SettlementResult<()> {
        self.validate_balances()?;
        self.validate_holders()?;
        self.validate_blocks()?;
        self.validate_exodus()
    }

    fn validate_balances(&self) -> SettlementResult<()> {
        let mut keys = HashSet::with_capacity(self.balances.len());
        for (key, entry) in &self.balances {
            if !keys.insert(*key) {
                return Err(corrupt("duplicate balance entry"));
            }
            if entry.available.checked_add(entry.locked).is_none() {
                return Err(corrupt("balance total overflows"));
            }
            if entry.locked == 0 && entry.locked_until != 0 {
                return Err(corrupt("unlock height without locked funds"));
            }
        }
        Ok(())
    }

    fn validate_holders(&self) -> SettlementResult<()> {
        let len = self.holders.len() as u64;
        if self.holders_settled_through > self.holder_cursor || self.holder_cursor > len {
            return Err(corrupt(format!(
                "holder regions out of bounds: settled {} cursor {} len {}",
                self.holders_settled_through, self.holder_cursor, len
            )));
        }

        let mut pending: HashMap<_, Amount> = HashMap::new();
        for (index, holder) in self.holders.iter().enumerate() {
            if holder.sequence != index as u64 {
                return Err(corrupt(format!("holder {index} has sequence {}", holder.sequence)));
            }
            if holder.amount == 0 {
                return Err(corrupt(format!("holder {index} has zero amount")));
            }
            if holder.kind == HolderKind::Deposit && holder.sequence >= self.holders_settled_through {
                let sum = pending.entry((holder.owner, holder.token)).or_insert(0);
                *sum = sum
                    .checked_add(holder.amount)
                    .ok_or_else(|| corrupt(format!("pending deposits overflow at holder {index}")))?;
            }
        }
        Ok(())
    }

    fn validate_blocks(&self) -> SettlementResult<()> {
        let committed = self.blocks.len() as u64;
        if self.total_verified > committed {
            return Err(corrupt(format!(
                "{} verified of {} committed blocks",
                self.total_verified, committed
            )));
        }

        let mut range_end = 0;
        let mut verified_end = 0;
        for (index, block) in self.blocks.iter().enumerate() {
            let number = index as u64 + 1;
            if block.number != number {
                return Err(corrupt(format!("block at position {number} is numbered {}", block.number)));
            }
            let expected = if number <= self.total_verified {
                BlockStatus::Verified
            } else {
                BlockStatus::Pending
            };
            if block.status != expected {
                return Err(corrupt(format!("block {number} is {:?}, expected {expected:?}", block.status)));
            }
            let range = block.holder_range;
            if range.start != range_end || range.start > range.end {
                return Err(corrupt(format!("block {number} holder range is not contiguous")));
            }
            range_end = range.end;
            if number == self.total_verified {
                verified_end = range.end;
                if block.new_state_root != self.last_verified_root {
                    return Err(corrupt("last verified root does not match block"));
                }
            }
        }

        if range_end > self.holder_cursor || verified_end > self.holders_settled_through {
            return Err(corrupt("block holder ranges exceed the holder regions"));
        }
        if !self.exodus.is_active()
            && (range_end != self.holder_cursor || verified_end != self.holders_settled_through)
        {
            return Err(corrupt("holder regions do not match committed blocks"));
        }

        let mut reverted = HashSet::with_capacity(self.reverted_blocks.len());
        for block in &self.reverted_blocks {
            if block.status != BlockStatus::Reverted
                || block.number <= self.total_verified
                || !reverted.insert(block.number)
            {
                return Err(corrupt(format!("invalid reverted log entry for block {}", block.number)));
            }
        }
        Ok(())
    }

    fn validate_exodus(&self) -> SettlementResult<()> {
        match self.exodus.activation() {
            Some(activation) => {
                if activation.last_verified_block != self.total_verified
                    || activation.last_verified_root != self.last_verified_root
                {
                    return Err(corrupt("exodus activation does not match the last verified block"));
                }
            }
            None if !self.exited.is_empty() => {
                return Err(corrupt("exits recorded outside exodus"));
            }
            None => {}
        }

        let mut seen = HashSet::with_capacity(self.exited.len());
        if !self.exited.iter().all(|key| seen.insert(*key)) {
            return Err(corrupt("duplicate exit record"));
        }
        Ok(())
    }
}

fn corrupt(reason: impl Into<String>) -> SettlementError {
    SettlementError::Snapshot {
        reason: reason.into(),
    }
}

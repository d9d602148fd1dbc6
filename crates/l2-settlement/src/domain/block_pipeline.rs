//! Block Pipeline
//!
//! Sequentially numbered rollup blocks moving through a two-phase
//! commit/verify protocol.
//!
//! ```text
//! [PENDING] ──verify──→ [VERIFIED]
//!     │
//!     └── age > expiry_threshold ──→ (EXPIRED) ──revert_expired──→ [REVERTED]
//! ```
//!
//! `Expired` is never stored: it is derived from the commit height whenever a
//! caller asks. Blocks live in a `Vec` indexed by `number - 1`, so a revert
//! cascade is a truncation back to the last verified block.

use super::holder_queue::HolderRange;
use serde::{Deserialize, Serialize};
use shared_types::{Address, BlockHeight, BlockNumber, Hash};

/// Lifecycle state of a block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockStatus {
    /// Committed, waiting for a proof
    Pending,
    /// Proof accepted, holders applied (terminal)
    Verified,
    /// Unverified past the expiry threshold (derived)
    Expired,
    /// Holders released back to the queue (terminal)
    Reverted,
}

/// A committed rollup block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: BlockNumber,
    pub data_commitment: Hash,
    pub new_state_root: Hash,
    pub committed_at: BlockHeight,
    /// Zero until verified
    pub verified_at: BlockHeight,
    pub validator: Address,
    pub holder_range: HolderRange,
    /// Stored status: `Pending`, `Verified` or `Reverted`
    pub status: BlockStatus,
}

impl Block {
    pub fn new(
        number: BlockNumber,
        new_state_root: Hash,
        data_commitment: Hash,
        validator: Address,
        holder_range: HolderRange,
        committed_at: BlockHeight,
    ) -> Self {
        Self {
            number,
            data_commitment,
            new_state_root,
            committed_at,
            verified_at: 0,
            validator,
            holder_range,
            status: BlockStatus::Pending,
        }
    }

    /// First height at which this block counts as expired.
    pub fn expires_at(&self, expiry_threshold: BlockHeight) -> BlockHeight {
        self.committed_at
            .saturating_add(expiry_threshold)
            .saturating_add(1)
    }

    pub fn is_expired(&self, now: BlockHeight, expiry_threshold: BlockHeight) -> bool {
        self.status == BlockStatus::Pending
            && now.saturating_sub(self.committed_at) > expiry_threshold
    }

    /// Stored status with expiry applied.
    pub fn status_at(&self, now: BlockHeight, expiry_threshold: BlockHeight) -> BlockStatus {
        if self.is_expired(now, expiry_threshold) {
            BlockStatus::Expired
        } else {
            self.status
        }
    }
}

/// Result of a revert pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertOutcome {
    /// Blocks reverted because they expired
    pub expired: Vec<BlockNumber>,
    /// Later blocks reverted because they built on an expired block
    pub invalidated: Vec<BlockNumber>,
    /// Union of released holder ranges
    pub released: HolderRange,
}

impl RevertOutcome {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.invalidated.is_empty()
    }

    pub fn reverted_count(&self) -> usize {
        self.expired.len() + self.invalidated.len()
    }
}

/// The committed block sequence and its counters
///
/// INVARIANT: `blocks[i].number == i + 1`
/// INVARIANT: `total_verified <= total_committed`
/// INVARIANT: `reverted` holds at most one block per number, all above `total_verified`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockPipeline {
    blocks: Vec<Block>,
    total_verified: u64,
    last_verified_root: Hash,
    reverted: Vec<Block>,
    consecutive_expiry_reverts: u64,
}

impl BlockPipeline {
    pub fn new(genesis_state_root: Hash) -> Self {
        Self {
            blocks: Vec::new(),
            total_verified: 0,
            last_verified_root: genesis_state_root,
            reverted: Vec::new(),
            consecutive_expiry_reverts: 0,
        }
    }

    /// Rebuild from persisted parts.
    pub fn restore(
        blocks: Vec<Block>,
        total_verified: u64,
        last_verified_root: Hash,
        reverted: Vec<Block>,
        consecutive_expiry_reverts: u64,
    ) -> Self {
        Self {
            blocks,
            total_verified,
            last_verified_root,
            reverted,
            consecutive_expiry_reverts,
        }
    }

    pub fn total_committed(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn total_verified(&self) -> u64 {
        self.total_verified
    }

    /// Committed blocks still waiting for verification.
    pub fn outstanding(&self) -> u64 {
        self.total_committed() - self.total_verified
    }

    pub fn next_commit_number(&self) -> BlockNumber {
        self.total_committed() + 1
    }

    pub fn next_verify_number(&self) -> BlockNumber {
        self.total_verified + 1
    }

    pub fn last_verified_root(&self) -> Hash {
        self.last_verified_root
    }

    pub fn block(&self, number: BlockNumber) -> Option<&Block> {
        let index = number.checked_sub(1)?;
        self.blocks.get(index as usize)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Latest reverted block for each number not yet verified again.
    pub fn reverted_log(&self) -> &[Block] {
        &self.reverted
    }

    /// Revert passes in a row that found expired blocks, reset by a verification.
    pub fn consecutive_expiry_reverts(&self) -> u64 {
        self.consecutive_expiry_reverts
    }

    /// Oldest block that is committed but not verified.
    pub fn oldest_unverified(&self) -> Option<&Block> {
        self.block(self.next_verify_number())
    }

    /// The oldest unverified block, if it has expired.
    pub fn oldest_expired(&self, now: BlockHeight, expiry_threshold: BlockHeight) -> Option<&Block> {
        self.oldest_unverified()
            .filter(|block| block.is_expired(now, expiry_threshold))
    }

    /// Status of a block, including reverted blocks no longer in the sequence.
    pub fn status_of(
        &self,
        number: BlockNumber,
        now: BlockHeight,
        expiry_threshold: BlockHeight,
    ) -> Option<BlockStatus> {
        if let Some(block) = self.block(number) {
            return Some(block.status_at(now, expiry_threshold));
        }
        self.reverted
            .iter()
            .rev()
            .find(|block| block.number == number)
            .map(|_| BlockStatus::Reverted)
    }

    /// Append a freshly committed block.
    pub fn push(&mut self, block: Block) {
        debug_assert_eq!(block.number, self.next_commit_number());
        self.blocks.push(block);
    }

    /// Mark the next block verified and advance the verified counter.
    pub fn mark_verified(&mut self, verified_at: BlockHeight) -> &Block {
        let index = self.total_verified as usize;
        let block = &mut self.blocks[index];
        block.status = BlockStatus::Verified;
        block.verified_at = verified_at;
        self.last_verified_root = block.new_state_root;
        self.total_verified += 1;
        self.consecutive_expiry_reverts = 0;
        let verified = self.total_verified;
        self.reverted.retain(|b| b.number > verified);
        &self.blocks[index]
    }

    /// Remove every unverified block, newest last, marking each reverted.
    ///
    /// `total_committed` rewinds to `total_verified`.
    pub fn truncate_unverified(&mut self) -> Vec<Block> {
        let mut removed = self.blocks.split_off(self.total_verified as usize);
        for block in &mut removed {
            block.status = BlockStatus::Reverted;
        }
        if let Some(first) = removed.first().map(|b| b.number) {
            let last = first + removed.len() as u64;
            self.reverted.retain(|b| b.number < first || b.number >= last);
            self.reverted.extend(removed.iter().cloned());
            self.reverted.sort_by_key(|b| b.number);
        }
        self.consecutive_expiry_reverts += 1;
        removed
    }
}

//! Domain module for the settlement coordinator
//!
//! ## Components (leaf-first)
//! - balance_ledger: custody balances with time locks
//! - holder_queue: pending deposits/withdrawals
//! - block_pipeline: commit → verify → revert block sequence
//! - exodus: one-way halt latch and exit registry
//! - snapshot: persisted layout of all of the above

pub mod balance_ledger;
pub mod block_pipeline;
pub mod exodus;
pub mod holder_queue;
pub mod snapshot;

pub use balance_ledger::{BalanceEntry, BalanceKey, BalanceLedger, LedgerBatch};
pub use block_pipeline::{Block, BlockPipeline, BlockStatus, RevertOutcome};
pub use exodus::{ExodusActivation, ExodusController, ExodusMode};
pub use holder_queue::{Holder, HolderKind, HolderQueue, HolderRange};
pub use snapshot::SettlementSnapshot;

//! # Settlement Metrics
//!
//! Prometheus metrics for the block pipeline and exodus state.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! l2-settlement = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `l2_blocks_committed_total` - Counter of committed blocks
//! - `l2_blocks_verified_total` - Counter of verified blocks
//! - `l2_blocks_reverted_total` - Counter of reverted blocks (by cause)
//! - `l2_operations_rejected_total` - Counter of rejected calls (by error label)
//! - `l2_outstanding_blocks` - Gauge of committed-but-unverified blocks
//! - `l2_unclaimed_holders` - Gauge of holders not yet claimed by a block
//! - `l2_exodus_active` - Gauge set to 1 once exodus is triggered
//! - `l2_exit_owners_total` - Counter of owners credited by exit batches

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_gauge, register_int_counter, register_int_counter_vec, Gauge, IntCounter,
    IntCounterVec,
};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref BLOCKS_COMMITTED: IntCounter = register_int_counter!(
        "l2_blocks_committed_total",
        "Total number of blocks committed"
    )
    .expect("Failed to create BLOCKS_COMMITTED metric");

    pub static ref BLOCKS_VERIFIED: IntCounter = register_int_counter!(
        "l2_blocks_verified_total",
        "Total number of blocks verified"
    )
    .expect("Failed to create BLOCKS_VERIFIED metric");

    /// Reverted blocks, labeled `expired` or `invalidated`
    pub static ref BLOCKS_REVERTED: IntCounterVec = register_int_counter_vec!(
        "l2_blocks_reverted_total",
        "Total number of blocks reverted",
        &["cause"]
    )
    .expect("Failed to create BLOCKS_REVERTED metric");

    /// Rejected calls, labeled by error
    pub static ref OPERATIONS_REJECTED: IntCounterVec = register_int_counter_vec!(
        "l2_operations_rejected_total",
        "Total number of rejected settlement calls",
        &["error"]
    )
    .expect("Failed to create OPERATIONS_REJECTED metric");

    pub static ref OUTSTANDING_BLOCKS: Gauge = register_gauge!(
        "l2_outstanding_blocks",
        "Committed blocks awaiting verification"
    )
    .expect("Failed to create OUTSTANDING_BLOCKS metric");

    pub static ref UNCLAIMED_HOLDERS: Gauge = register_gauge!(
        "l2_unclaimed_holders",
        "Queued deposits and withdrawals not yet claimed by a block"
    )
    .expect("Failed to create UNCLAIMED_HOLDERS metric");

    pub static ref EXODUS_ACTIVE: Gauge = register_gauge!(
        "l2_exodus_active",
        "Whether exodus mode is active (0=no, 1=yes)"
    )
    .expect("Failed to create EXODUS_ACTIVE metric");

    pub static ref EXIT_OWNERS: IntCounter = register_int_counter!(
        "l2_exit_owners_total",
        "Total number of owners credited through exit batches"
    )
    .expect("Failed to create EXIT_OWNERS metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

#[cfg(feature = "metrics")]
pub fn record_block_committed() {
    BLOCKS_COMMITTED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_block_verified() {
    BLOCKS_VERIFIED.inc();
}

/// Record one revert sweep
#[cfg(feature = "metrics")]
pub fn record_blocks_reverted(expired: usize, invalidated: usize) {
    BLOCKS_REVERTED
        .with_label_values(&["expired"])
        .inc_by(expired as u64);
    BLOCKS_REVERTED
        .with_label_values(&["invalidated"])
        .inc_by(invalidated as u64);
}

#[cfg(feature = "metrics")]
pub fn record_rejection(label: &str) {
    OPERATIONS_REJECTED.with_label_values(&[label]).inc();
}

#[cfg(feature = "metrics")]
pub fn set_pipeline_depth(outstanding_blocks: u64, unclaimed_holders: u64) {
    OUTSTANDING_BLOCKS.set(outstanding_blocks as f64);
    UNCLAIMED_HOLDERS.set(unclaimed_holders as f64);
}

#[cfg(feature = "metrics")]
pub fn set_exodus_active(active: bool) {
    EXODUS_ACTIVE.set(if active { 1.0 } else { 0.0 });
}

#[cfg(feature = "metrics")]
pub fn record_exit(owners: usize) {
    EXIT_OWNERS.inc_by(owners as u64);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_block_committed() {}

#[cfg(not(feature = "metrics"))]
pub fn record_block_verified() {}

#[cfg(not(feature = "metrics"))]
pub fn record_blocks_reverted(_expired: usize, _invalidated: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn record_rejection(_label: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn set_pipeline_depth(_outstanding_blocks: u64, _unclaimed_holders: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn set_exodus_active(_active: bool) {}

#[cfg(not(feature = "metrics"))]
pub fn record_exit(_owners: usize) {}

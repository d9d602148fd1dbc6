//! Expiry Watchdog Policy
//!
//! Decides, from a [`LivenessReport`], whether the pipeline has stalled long
//! enough to enter exodus. The decision is advisory: the caller still has to
//! invoke `trigger` with the watchdog identity.

use crate::ports::inbound::LivenessReport;
use shared_types::Address;

/// What the watchdog wants done after looking at a liveness report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchdogDecision {
    /// Pipeline healthy, nothing to do
    Idle,
    /// Oldest unverified block expired; revert before anything else
    Revert,
    /// Too many expiry reverts in a row; enter exodus
    Trigger,
    /// Exodus already active
    Halted,
}

/// Watchdog policy: trigger exodus after `expiry_limit` consecutive expiry
/// reverts without an intervening verification.
#[derive(Clone, Copy, Debug)]
pub struct ExpiryWatchdog {
    identity: Address,
    expiry_limit: u64,
}

impl ExpiryWatchdog {
    pub fn new(identity: Address, expiry_limit: u64) -> Self {
        Self {
            identity,
            expiry_limit: expiry_limit.max(1),
        }
    }

    /// Identity to pass to `trigger`.
    pub fn identity(&self) -> Address {
        self.identity
    }

    pub fn expiry_limit(&self) -> u64 {
        self.expiry_limit
    }

    pub fn assess(&self, report: &LivenessReport) -> WatchdogDecision {
        if report.exodus {
            WatchdogDecision::Halted
        } else if report.consecutive_expiry_reverts >= self.expiry_limit {
            WatchdogDecision::Trigger
        } else if report.oldest_unverified_expired {
            WatchdogDecision::Revert
        } else {
            WatchdogDecision::Idle
        }
    }
}

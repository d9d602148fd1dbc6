//! Height Source Adapters

use crate::ports::outbound::HeightSource;
use shared_types::BlockHeight;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Height driven by the caller: tests and the node's root-chain follower.
#[derive(Debug, Default)]
pub struct ManualHeightSource {
    height: AtomicU64,
}

impl ManualHeightSource {
    pub fn new(initial: BlockHeight) -> Self {
        Self {
            height: AtomicU64::new(initial),
        }
    }

    /// Advance by `blocks` and return the new height.
    pub fn advance(&self, blocks: u64) -> BlockHeight {
        self.height.fetch_add(blocks, Ordering::SeqCst) + blocks
    }

    /// Jump to `height`. Heights never move backwards.
    pub fn set(&self, height: BlockHeight) {
        self.height.fetch_max(height, Ordering::SeqCst);
    }
}

impl HeightSource for ManualHeightSource {
    fn current_height(&self) -> BlockHeight {
        self.height.load(Ordering::SeqCst)
    }
}

/// Height derived from elapsed wall-clock time at a fixed block interval.
#[derive(Debug)]
pub struct WallClockHeightSource {
    origin: Instant,
    base: BlockHeight,
    interval: Duration,
}

impl WallClockHeightSource {
    /// Start counting at `base`, one height per `interval`.
    pub fn new(base: BlockHeight, interval: Duration) -> Self {
        Self {
            origin: Instant::now(),
            base,
            interval: interval.max(Duration::from_millis(1)),
        }
    }
}

impl HeightSource for WallClockHeightSource {
    fn current_height(&self) -> BlockHeight {
        let elapsed = self.origin.elapsed().as_millis() / self.interval.as_millis();
        self.base.saturating_add(elapsed as u64)
    }
}

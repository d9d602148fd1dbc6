//! # Node Runtime
//!
//! Wires the coordinator to its adapters and drives the liveness loop.
//!
//! ## Liveness loop
//!
//! ```text
//! every tick:
//!   liveness report ──→ watchdog policy
//!                          │
//!        ┌─────────────────┼──────────────────┬───────────────────┐
//!        ↓                 ↓                  ↓                   ↓
//!      Idle          revert_expired     trigger(watchdog)   drain_pending
//!                                                          (exodus active)
//!   then publish buffered events
//! ```

use crate::config::NodeConfig;
use crate::snapshot_store::{SnapshotStore, StoreError};
use l2_settlement::adapters::{
    ExpiryWatchdog, Keccak256ProofVerifier, StaticGovernance, WallClockHeightSource,
    WatchdogDecision,
};
use l2_settlement::{
    HeightSource, SettlementApi, SettlementResult, SettlementService, SettlementSnapshot,
};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Coordinator as hosted by the node.
pub type NodeService<H> = SettlementService<StaticGovernance, Keccak256ProofVerifier, H>;

pub struct NodeRuntime<H: HeightSource + 'static> {
    config: NodeConfig,
    service: Arc<NodeService<H>>,
    governance: Arc<StaticGovernance>,
    watchdog: ExpiryWatchdog,
    store: SnapshotStore,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    /// Running liveness loop, joined on shutdown before the final snapshot
    liveness_task: Mutex<Option<JoinHandle<()>>>,
}

impl NodeRuntime<WallClockHeightSource> {
    /// Restore from the data directory and start heights where the last
    /// snapshot left off.
    pub fn bootstrap(config: NodeConfig) -> Result<Self, StoreError> {
        let store = SnapshotStore::new(config.storage.snapshot_path());
        let snapshot = store.load()?;
        let base = snapshot.as_ref().map(|s| s.saved_at).unwrap_or(0);
        let height = Arc::new(WallClockHeightSource::new(
            base,
            config.liveness.height_interval(),
        ));
        Ok(Self::with_height(config, height, store, snapshot)?)
    }
}

impl<H: HeightSource + 'static> NodeRuntime<H> {
    pub fn with_height(
        config: NodeConfig,
        height: Arc<H>,
        store: SnapshotStore,
        snapshot: Option<SettlementSnapshot>,
    ) -> SettlementResult<Self> {
        let governance = Arc::new(StaticGovernance::with_validators(
            config.validators.iter().copied(),
        ));
        let verifier = Arc::new(Keccak256ProofVerifier);
        let settlement = config.settlement.clone();

        let service = match snapshot {
            Some(snapshot) => SettlementService::from_snapshot(
                settlement,
                snapshot,
                Arc::clone(&governance),
                verifier,
                height,
            )?,
            None => SettlementService::new(settlement, Arc::clone(&governance), verifier, height),
        };

        let watchdog = ExpiryWatchdog::new(
            config.settlement.watchdog,
            config.liveness.watchdog_expiry_limit,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            service: Arc::new(service),
            governance,
            watchdog,
            store,
            shutdown_tx,
            shutdown_rx,
            liveness_task: Mutex::new(None),
        })
    }

    pub fn service(&self) -> Arc<NodeService<H>> {
        Arc::clone(&self.service)
    }

    pub fn governance(&self) -> Arc<StaticGovernance> {
        Arc::clone(&self.governance)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// One pass of the liveness loop.
    pub async fn tick(&self) -> SettlementResult<WatchdogDecision> {
        let report = self.service.liveness().await;
        let decision = self.watchdog.assess(&report);

        match decision {
            WatchdogDecision::Idle => {}
            WatchdogDecision::Revert => {
                self.service.revert_expired().await?;
            }
            WatchdogDecision::Trigger => {
                warn!(
                    "[l2] Watchdog: {} consecutive expiry reverts, entering exodus",
                    report.consecutive_expiry_reverts
                );
                self.service.trigger(self.watchdog.identity()).await?;
            }
            WatchdogDecision::Halted => {
                if self.service.totals().await.unsettled_holders > 0 {
                    self.service
                        .drain_pending(self.config.liveness.drain_batch)
                        .await?;
                }
            }
        }

        self.publish_events().await;
        Ok(decision)
    }

    async fn publish_events(&self) {
        for event in self.service.take_events().await {
            match serde_json::to_string(&event) {
                Ok(json) => info!(target: "l2::events", "[l2] {} {}", event.name(), json),
                Err(e) => warn!("[l2] Failed to encode {} event: {}", event.name(), e),
            }
        }
    }

    /// Run the liveness loop until shutdown is signalled.
    ///
    /// A tick that has started always runs to completion; a due tick is
    /// taken before a pending shutdown.
    fn spawn_liveness_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let runtime = Arc::clone(self);
        let mut shutdown = self.shutdown_rx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(runtime.config.liveness.tick_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = interval.tick() => {
                        if let Err(e) = runtime.tick().await {
                            warn!("[l2] Liveness tick failed: {}", e);
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("[l2] Liveness loop stopping");
                        break;
                    }
                }
            }
        })
    }

    pub async fn start(self: &Arc<Self>) {
        let totals = self.service.totals().await;
        info!("===========================================");
        info!("  L2 Settlement Node v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");
        info!(
            "Blocks committed/verified: {}/{}",
            totals.total_committed, totals.total_verified
        );
        info!("Validators: {}", self.governance.validator_count());
        info!("Exodus active: {}", self.service.is_exodus().await);
        info!("Data Dir: {:?}", self.config.storage.data_dir);

        let handle = self.spawn_liveness_loop();
        if let Some(previous) = self.liveness_task.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Stop the loop, wait for it to finish, then persist the coordinator.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            warn!("Failed to send shutdown signal: {}", e);
        }
        if let Some(handle) = self.liveness_task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("Liveness loop ended abnormally: {}", e);
            }
        }

        let snapshot = self.service.snapshot().await;
        self.store.save(&snapshot)?;

        info!("Shutdown complete");
        Ok(())
    }
}

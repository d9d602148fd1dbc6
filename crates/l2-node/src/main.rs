//! # L2 Settlement Node
//!
//! Hosts the settlement coordinator.
//!
//! ## Startup Sequence
//!
//! 1. Initialise logging (`RUST_LOG` honoured, `info` by default)
//! 2. Load configuration from the environment and validate it
//! 3. Restore the last snapshot from the data directory, if any
//! 4. Start the liveness loop
//! 5. On Ctrl+C, stop the loop, wait for it to finish and save a fresh snapshot

use anyhow::{Context, Result};
use l2_node::{NodeConfig, NodeRuntime};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = NodeConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let runtime = Arc::new(NodeRuntime::bootstrap(config).context("Failed to restore snapshot")?);
    runtime.start().await;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime
        .shutdown()
        .await
        .context("Failed to persist snapshot")?;

    Ok(())
}

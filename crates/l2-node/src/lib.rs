//! # L2 Node Library
//!
//! Exposes the node's modules for testing. The entry point is the `main.rs`
//! binary.

pub mod config;
pub mod runtime;
pub mod snapshot_store;

pub use config::{ConfigError, NodeConfig};
pub use runtime::{NodeRuntime, NodeService};
pub use snapshot_store::{SnapshotStore, StoreError};

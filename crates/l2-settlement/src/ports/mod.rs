//! Ports module for the settlement coordinator

pub mod inbound;
pub mod outbound;

pub use inbound::SettlementApi;
pub use outbound::{Governance, HeightSource, ProofVerifier};

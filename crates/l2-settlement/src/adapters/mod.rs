//! # Adapters Layer (Hexagonal Architecture)
//!
//! Concrete implementations of the outbound ports, plus the watchdog policy
//! that decides when liveness has failed badly enough to enter exodus.

mod governance;
mod height_source;
mod proof_verifier;
mod watchdog;

pub use governance::StaticGovernance;
pub use height_source::{ManualHeightSource, WallClockHeightSource};
pub use proof_verifier::{FixedVerifier, Keccak256ProofVerifier};
pub use watchdog::{ExpiryWatchdog, WatchdogDecision};

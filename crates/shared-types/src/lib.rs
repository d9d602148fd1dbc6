//! # Shared Types Crate
//!
//! Primitive identifiers used across the settlement workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: identifiers used by more than one crate live here.
//! - **Fixed Width**: amounts and heights are fixed-width integers; callers use
//!   checked arithmetic and never rely on wrapping.

pub mod entities;

pub use entities::*;

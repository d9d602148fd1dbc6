//! # L2 Settlement Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── flows.rs       # End-to-end scenarios through the service API
//!     └── properties.rs  # Randomized invariants (exactly-once, revert, atomicity)
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p l2-tests
//! cargo test -p l2-tests integration::properties::
//! ```

pub mod integration;

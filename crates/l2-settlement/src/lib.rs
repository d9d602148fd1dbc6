//! # l2-settlement
//!
//! Root-chain side of a validity rollup: custody balances, a queue of
//! pending deposits and withdrawals, the commit → verify → revert block
//! pipeline, and the exodus fallback that lets users recover funds once the
//! pipeline stops making progress.
//!
//! ## Overview
//!
//! - **Balance ledger**: per-(owner, token) balances with time-locked deposits
//! - **Holder queue**: append-only pending operations, claimed by blocks in order
//! - **Block pipeline**: strictly sequential commit and verify, expiry-driven revert
//! - **Exodus**: one-way halt; users exit against the last verified state root
//!
//! ## Architecture
//!
//! ```text
//!  append_deposit / append_withdraw
//!              │
//!              ▼
//!   ┌──────────────────────┐   claim    ┌──────────────────┐
//!   │     Holder queue     │──────────→ │  Block pipeline  │
//!   │ settled│claimed│open │ ←────────  │ commit → verify  │
//!   └──────────────────────┘  release   └────────┬─────────┘
//!                                                │ verify applies holders
//!                                                ▼
//!                                      ┌──────────────────┐
//!                                      │  Balance ledger  │
//!                                      └────────▲─────────┘
//!                                               │ exit / drain
//!                                      ┌────────┴─────────┐
//!                                      │  Exodus latch    │
//!                                      └──────────────────┘
//! ```
//!
//! ## Block lifecycle
//!
//! ```text
//! [PENDING] ──verify──→ [VERIFIED]
//!     │
//!     └──height passes threshold──→ (EXPIRED) ──revert_expired──→ [REVERTED]
//! ```
//!
//! `EXPIRED` is derived from the commit height and never stored.
//!
//! ## Example
//!
//! ```rust,ignore
//! use l2_settlement::{SettlementService, SettlementConfig, SettlementApi};
//! use l2_settlement::adapters::{StaticGovernance, Keccak256ProofVerifier, ManualHeightSource};
//!
//! let service = SettlementService::new(
//!     SettlementConfig::default(),
//!     Arc::new(StaticGovernance::with_validators([validator])),
//!     Arc::new(Keccak256ProofVerifier),
//!     Arc::new(ManualHeightSource::new(0)),
//! );
//!
//! service.append_deposit(NATIVE_TOKEN, owner, 100).await?;
//! service.commit(1, root, commitment, 1, validator).await?;
//! service.verify(1, proof, validator).await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod state;
pub mod types;

pub use domain::{
    BalanceEntry, BalanceKey, BalanceLedger, Block, BlockPipeline, BlockStatus, ExodusActivation,
    ExodusController, ExodusMode, Holder, HolderKind, HolderQueue, HolderRange, RevertOutcome,
    SettlementSnapshot,
};
pub use error::{SettlementError, SettlementResult};
pub use events::{CorrelationId, SettlementEvent};
pub use ports::inbound::{
    DrainOutcome, ExitOutcome, LivenessReport, PipelineTotals, SettlementApi, VerifyOutcome,
};
pub use ports::outbound::{Governance, HeightSource, ProofVerifier};
pub use service::SettlementService;
pub use state::{OperationContext, SettlementState};
pub use types::SettlementConfig;

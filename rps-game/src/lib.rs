//! Client-side session logic for a two-player Rock-Paper-Scissors contract.
//!
//! Players join a single on-chain game, commit to a hidden move, then
//! reveal it. This crate keeps a local view of the contract in sync,
//! builds the commitments, and drives the join/commit/reveal intents.

pub mod commitment;
pub mod context;
pub mod error;
pub mod session;
pub mod sync;

pub use commitment::{CommitmentCodec, CommitmentScheme};
pub use context::SessionContext;
pub use error::{GameError, Result};
pub use session::{Intent, JoinReceipt, RevealSource, SessionOrchestrator, SessionStatus};
pub use sync::{SessionSynchronizer, SyncFailure, SyncHandle};

//! Core plumbing for a Rock-Paper-Scissors commit-reveal client.
//!
//! This crate talks to the ledger: typed contract access, the signing
//! identity, local retention of committed moves, and client configuration.
//! Session logic lives in `rps-game`.

pub mod config;
pub mod error;
pub mod ledger;
pub mod prompt;
pub mod storage;
pub mod types;
pub mod wallet;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::ClientConfig;
pub use error::{CoreError, Result};
pub use ledger::{EthLedger, LedgerGateway};
pub use prompt::Prompter;
pub use storage::{MoveStore, RetainedMove, Storage};
pub use types::{
    BetAmount, Commitment, CommitmentEncoding, MoveChoice, Secret, SessionSnapshot, Slot,
};
pub use wallet::{IdentityGateway, WalletIdentity};

pub use ethers::types::Address;

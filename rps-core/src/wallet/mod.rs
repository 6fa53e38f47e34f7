pub mod identity;

pub use identity::WalletIdentity;

use crate::error::{CoreError, Result};
use async_trait::async_trait;
use ethers::signers::LocalWallet;
use ethers::types::Address;

/// Source of the acting party's address and of the authorization to sign
/// operations against the ledger.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Establishes the authorized signing context and returns its address.
    ///
    /// Idempotent: once authorized, later calls return the same address
    /// without asking the user again.
    async fn connect(&self) -> Result<Address>;
}

/// Parses a hex private key (with or without `0x`).
pub fn parse_signing_key(private_key: &str) -> Result<LocalWallet> {
    private_key
        .trim()
        .trim_start_matches("0x")
        .parse::<LocalWallet>()
        // the key itself must never end up in an error message or a log line
        .map_err(|_| CoreError::config("Invalid private key"))
}

use crate::error::{CoreError, Result};
use crate::types::CommitmentEncoding;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Contract the client talks to when none is configured.
pub const DEFAULT_CONTRACT: &str = "0x0e50d781af56fc299bA2b4a5D24dCfb2ba60ca2D";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub rpc_url: String,
    pub contract_address: Address,
    /// Read from the node when unset.
    pub chain_id: Option<u64>,
    pub poll_interval: Duration,
    pub confirmations: usize,
    pub commitment_encoding: CommitmentEncoding,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            contract_address: Address::from_str(DEFAULT_CONTRACT).unwrap_or_default(),
            chain_id: None,
            poll_interval: Duration::from_secs(5),
            confirmations: 1,
            commitment_encoding: CommitmentEncoding::Concatenated,
        }
    }
}

impl ClientConfig {
    pub fn new(rpc_url: impl Into<String>, contract_address: Address) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract_address,
            ..Self::default()
        }
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(CoreError::config("RPC URL cannot be empty"));
        }

        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(CoreError::config(format!(
                "RPC URL must be http(s): {}",
                self.rpc_url
            )));
        }

        if self.contract_address.is_zero() {
            return Err(CoreError::config("Contract address cannot be zero"));
        }

        if self.poll_interval.is_zero() {
            return Err(CoreError::config("Poll interval must be greater than 0"));
        }

        if self.confirmations == 0 {
            return Err(CoreError::config("Confirmations must be at least 1"));
        }

        if self.commitment_encoding != CommitmentEncoding::default() {
            tracing::warn!(
                "Commitment encoding {:?} does not match what the deployed contract checks; reveals will revert",
                self.commitment_encoding
            );
        }

        Ok(())
    }
}

pub fn parse_address(s: &str) -> Result<Address> {
    Address::from_str(s.trim()).map_err(|e| CoreError::InvalidAddress(format!("{}: {}", s, e)))
}

//! Typed interface over the Rock-Paper-Scissors contract.

pub mod ethereum;

pub use ethereum::EthLedger;

use crate::error::{CoreError, Result};
use crate::types::{BetAmount, Commitment, MoveChoice, Secret, SessionSnapshot};
use async_trait::async_trait;
use ethers::types::Address;

/// Operations the client needs from the contract.
///
/// Writes return only once the transaction is final; the gateway keeps no
/// state between calls, the next [`LedgerGateway::fetch_snapshot`] is the
/// only way to observe a write's effect.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    fn contract_address(&self) -> Address;

    /// Current players and stake. An untouched contract reads as
    /// [`SessionSnapshot::empty`], never as an error.
    async fn fetch_snapshot(&self) -> Result<SessionSnapshot>;

    async fn submit_join(&self, amount: BetAmount) -> Result<()>;

    async fn submit_commitment(&self, commitment: Commitment) -> Result<()>;

    async fn submit_reveal(&self, choice: MoveChoice, secret: &Secret) -> Result<()>;
}

/// Maps a node or wallet error message to the error taxonomy.
pub fn classify_failure(message: &str) -> CoreError {
    let lower = message.to_ascii_lowercase();

    if lower.contains("insufficient funds") {
        return CoreError::InsufficientFunds(message.to_string());
    }

    if lower.contains("user rejected") || lower.contains("user denied") {
        return CoreError::TransactionRejected(message.to_string());
    }

    if let Some(idx) = lower.find("execution reverted") {
        let rest = &message[idx + "execution reverted".len()..];
        // JSON-RPC errors render as "(code: 3, message: ..., data: ...)"
        let rest = rest.split(", data:").next().unwrap_or(rest);
        let reason = rest
            .trim_start_matches(':')
            .trim()
            .trim_end_matches(')')
            .trim_matches('"');
        return if reason.is_empty() {
            CoreError::reverted("execution reverted")
        } else {
            CoreError::reverted(reason)
        };
    }

    if lower.contains("revert") {
        return CoreError::reverted(message);
    }

    CoreError::network(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure("(code: -32000, message: insufficient funds for gas * price + value)"),
            CoreError::InsufficientFunds(_)
        ));
        assert!(matches!(
            classify_failure("MetaMask: User denied transaction signature"),
            CoreError::TransactionRejected(_)
        ));
        assert!(matches!(
            classify_failure("error sending request: connection refused"),
            CoreError::Network(_)
        ));

        match classify_failure(
            "(code: 3, message: execution reverted: Bet must match player 1, data: Some(String(\"0x08c3\")))",
        ) {
            CoreError::ContractReverted(reason) => assert_eq!(reason, "Bet must match player 1"),
            other => panic!("unexpected {:?}", other),
        }

        match classify_failure("execution reverted") {
            CoreError::ContractReverted(reason) => assert_eq!(reason, "execution reverted"),
            other => panic!("unexpected {:?}", other),
        }
    }
}

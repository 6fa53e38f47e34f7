use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("No wallet available: configure a signing key")]
    WalletUnavailable,

    #[error("Wallet authorization rejected by user")]
    UserRejected,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Contract reverted: {0}")]
    ContractReverted(String),

    #[error("Invalid bet amount: {0}")]
    InvalidBetAmount(String),

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Invalid secret: {0}")]
    InvalidSecret(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dialog error: {0}")]
    Dialog(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn dialog(msg: impl Into<String>) -> Self {
        Self::Dialog(msg.into())
    }

    pub fn reverted(msg: impl Into<String>) -> Self {
        Self::ContractReverted(msg.into())
    }

    /// True for failures reported by the node or contract after a submission
    /// attempt, as opposed to local validation failures.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::TransactionRejected(_)
                | Self::InsufficientFunds(_)
                | Self::ContractReverted(_)
        )
    }

    /// Most specific human-readable cause: the revert reason or transport
    /// message when there is one, the full error text otherwise.
    pub fn reason(&self) -> String {
        let reason = match self {
            Self::ContractReverted(reason)
            | Self::Network(reason)
            | Self::TransactionRejected(reason)
            | Self::InsufficientFunds(reason) => reason.trim().to_string(),
            other => other.to_string(),
        };

        if reason.is_empty() {
            "Unknown error".to_string()
        } else {
            reason
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_prefers_specific_cause() {
        assert_eq!(
            CoreError::reverted("Bet must match").reason(),
            "Bet must match"
        );
        assert_eq!(CoreError::network("   ").reason(), "Unknown error");
        assert_eq!(
            CoreError::WalletUnavailable.reason(),
            "No wallet available: configure a signing key"
        );
    }

    #[test]
    fn test_remote_classification() {
        assert!(CoreError::network("timeout").is_remote());
        assert!(CoreError::InsufficientFunds("x".into()).is_remote());
        assert!(!CoreError::InvalidBetAmount("0".into()).is_remote());
        assert!(!CoreError::UserRejected.is_remote());
    }
}

use crate::session::Intent;
use rps_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Error, Debug)]
pub enum GameError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Game is full")]
    GameFull,

    #[error("Already joined this game")]
    AlreadyJoined,

    #[error("Not a player in this game")]
    NotJoined,

    #[error("Waiting for an opponent to join")]
    GameNotReady,

    #[error("Wallet not connected")]
    NotConnected,

    #[error("Move already committed for this game")]
    AlreadyCommitted,

    #[error("No committed move waiting to be revealed")]
    NoPendingCommitment,

    #[error("Move and secret do not match the committed move")]
    CommitmentMismatch,

    #[error("{0} already in progress")]
    IntentInFlight(Intent),
}

impl GameError {
    /// Status text for a failure: the contract's revert reason or the
    /// transport message when available.
    pub fn reason(&self) -> String {
        match self {
            Self::Core(err) => err.reason(),
            other => other.to_string(),
        }
    }

    /// Caught before anything was sent to the ledger.
    pub fn is_local(&self) -> bool {
        match self {
            Self::Core(err) => !err.is_remote(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_and_locality() {
        let reverted = GameError::from(CoreError::reverted("Bet must match player 1"));
        assert_eq!(reverted.reason(), "Bet must match player 1");
        assert!(!reverted.is_local());

        assert_eq!(GameError::GameFull.reason(), "Game is full");
        assert!(GameError::CommitmentMismatch.is_local());
        assert!(GameError::from(CoreError::InvalidBetAmount("0".into())).is_local());
        assert_eq!(
            GameError::IntentInFlight(Intent::Join).to_string(),
            "join already in progress"
        );
    }
}

use rps_core::Address;
use serde::Serialize;
use std::fmt;

/// What the user is told about their session. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Loading,
    WalletMissing,
    Connected(Address),
    Joined,
    MoveCommitted,
    MoveRevealed,
    Failed(String),
}

impl SessionStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading..."),
            Self::WalletMissing => write!(f, "No wallet available: set a private key"),
            Self::Connected(address) => write!(f, "Connected as {:?}", address),
            Self::Joined => write!(f, "Joined the game"),
            Self::MoveCommitted => write!(f, "Move committed"),
            Self::MoveRevealed => write!(f, "Move revealed"),
            Self::Failed(reason) => write!(f, "Failed: {}", reason),
        }
    }
}

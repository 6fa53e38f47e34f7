//! Request/response capability for user input.
//!
//! The session logic asks for values through [`Prompter`] instead of talking
//! to a terminal, so any input surface (interactive prompts, CLI flags,
//! scripted test input) can drive it. Implementations return raw text; the
//! caller owns validation.

use crate::error::Result;
use async_trait::async_trait;
use ethers::types::Address;

#[async_trait]
pub trait Prompter: Send + Sync {
    /// Whether `address` may sign operations against `contract` for this session.
    async fn authorize(&self, address: Address, contract: Address) -> Result<bool>;

    /// Bet amount in ether, as typed.
    async fn bet_amount(&self) -> Result<String>;

    /// Move as typed ("1", "rock", ...).
    async fn move_choice(&self) -> Result<String>;

    async fn secret(&self) -> Result<String>;
}

use crate::error::{CoreError, Result};
use ethers::types::{Address, U256};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal places between wei and ether.
pub const ETHER_DECIMALS: usize = 18;

/// Stake denominated in wei, the ledger's integer base unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct BetAmount(U256);

impl BetAmount {
    pub const ZERO: BetAmount = BetAmount(U256::zero());

    pub fn from_wei(wei: U256) -> Self {
        Self(wei)
    }

    pub fn wei(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Parses an ether amount typed by a user. Conversion is exact: the
    /// fractional digits are right-padded to 18 places and read as an
    /// integer count of wei.
    pub fn parse_display(input: &str) -> Result<Self> {
        let text = input.trim();
        let invalid = |why: &str| CoreError::InvalidBetAmount(format!("'{}': {}", text, why));

        if text.is_empty() {
            return Err(invalid("amount is empty"));
        }

        let (whole, fraction) = match text.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (text, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("not a number"));
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid("not a positive decimal number"));
        }
        if fraction.len() > ETHER_DECIMALS {
            return Err(invalid("more than 18 decimal places"));
        }

        let digits = format!(
            "{}{:0<width$}",
            if whole.is_empty() { "0" } else { whole },
            fraction,
            width = ETHER_DECIMALS
        );
        let wei = U256::from_dec_str(&digits).map_err(|_| invalid("amount too large"))?;

        if wei.is_zero() {
            return Err(invalid("amount must be greater than zero"));
        }

        Ok(Self(wei))
    }

    /// Exact ether rendering, trailing zeros trimmed to one fractional digit.
    pub fn to_display(&self) -> String {
        let (ether, remainder) = self.0.div_mod(U256::exp10(ETHER_DECIMALS));
        let fraction = format!("{:0>width$}", remainder.as_u64(), width = ETHER_DECIMALS);
        let fraction = fraction.trim_end_matches('0');

        if fraction.is_empty() {
            format!("{}.0", ether)
        } else {
            format!("{}.{}", ether, fraction)
        }
    }
}

impl fmt::Display for BetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ETH", self.to_display())
    }
}

/// Move value as encoded by the contract: 1=Rock, 2=Paper, 3=Scissors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MoveChoice {
    Rock = 1,
    Paper = 2,
    Scissors = 3,
}

impl MoveChoice {
    pub const ALL: [MoveChoice; 3] = [MoveChoice::Rock, MoveChoice::Paper, MoveChoice::Scissors];

    pub fn wire(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MoveChoice {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Rock),
            2 => Ok(Self::Paper),
            3 => Ok(Self::Scissors),
            other => Err(CoreError::InvalidMove(format!(
                "{} is not a move (1=Rock, 2=Paper, 3=Scissors)",
                other
            ))),
        }
    }
}

impl From<MoveChoice> for u8 {
    fn from(choice: MoveChoice) -> Self {
        choice.wire()
    }
}

impl FromStr for MoveChoice {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim().to_ascii_lowercase();
        match text.as_str() {
            "rock" | "r" => Ok(Self::Rock),
            "paper" | "p" => Ok(Self::Paper),
            "scissors" | "s" => Ok(Self::Scissors),
            digits => digits
                .parse::<u8>()
                .map_err(|_| CoreError::InvalidMove(format!("'{}' is not a move", s.trim())))
                .and_then(Self::try_from),
        }
    }
}

impl fmt::Display for MoveChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rock => "Rock",
            Self::Paper => "Paper",
            Self::Scissors => "Scissors",
        };
        f.write_str(name)
    }
}

/// User-chosen string hiding a committed move. Only ever fed to the
/// commitment codec and, at reveal time, to the contract.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Secret(String);

impl Secret {
    /// Longest accepted secret, in UTF-8 bytes.
    pub const MAX_LEN: usize = 256;

    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(CoreError::InvalidSecret(
                "secret must not be empty".to_string(),
            ));
        }
        if value.len() > Self::MAX_LEN {
            return Err(CoreError::InvalidSecret(format!(
                "secret is {} bytes; at most {} allowed",
                value.len(),
                Self::MAX_LEN
            )));
        }
        Ok(Self(value))
    }

    /// Random 32-character hex secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Secret {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Secret> for String {
    fn from(secret: Secret) -> Self {
        secret.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// keccak-256 digest submitted to the contract in place of the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment([u8; 32]);

impl Commitment {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| CoreError::internal(format!("Invalid commitment hex: {}", e)))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| CoreError::internal("Commitment must be 32 bytes"))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// How a (move, secret) pair is turned into commitment preimage bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitmentEncoding {
    /// Decimal move digit immediately followed by the secret. This is what
    /// the deployed contract recomputes on reveal.
    #[default]
    Concatenated,
    /// Domain tag, move byte, big-endian u32 secret length, secret.
    LengthPrefixed,
}

/// Which slot a party occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    Player1,
    Player2,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player1 => f.write_str("player 1"),
            Self::Player2 => f.write_str("player 2"),
        }
    }
}

/// Point-in-time read of the contract's session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub player1: Address,
    pub player2: Address,
    pub bet_amount: BetAmount,
}

impl SessionSnapshot {
    pub fn new(player1: Address, player2: Address, bet_amount: BetAmount) -> Self {
        Self {
            player1,
            player2,
            bet_amount,
        }
    }

    /// No session yet: both slots unfilled.
    pub fn empty() -> Self {
        Self::new(Address::zero(), Address::zero(), BetAmount::ZERO)
    }

    pub fn is_open_for_player1(&self) -> bool {
        self.player1.is_zero()
    }

    pub fn is_full(&self) -> bool {
        !self.player1.is_zero() && !self.player2.is_zero()
    }

    /// Slots fill in order, so a second player without a first one means
    /// the read was inconsistent.
    pub fn is_consistent(&self) -> bool {
        !(self.player1.is_zero() && !self.player2.is_zero())
    }

    pub fn slot_of(&self, party: Address) -> Option<Slot> {
        if party.is_zero() {
            None
        } else if self.player1 == party {
            Some(Slot::Player1)
        } else if self.player2 == party {
            Some(Slot::Player2)
        } else {
            None
        }
    }
}

/// Full lowercase hex, or a placeholder for an unfilled slot.
pub fn display_address(address: &Address) -> String {
    if address.is_zero() {
        "(empty)".to_string()
    } else {
        format!("{:?}", address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display_is_exact() {
        let amount = BetAmount::parse_display("2.5").unwrap();
        assert_eq!(
            amount.wei(),
            U256::from_dec_str("2500000000000000000").unwrap()
        );

        let smallest = BetAmount::parse_display("0.000000000000000001").unwrap();
        assert_eq!(smallest.wei(), U256::one());

        let leading_dot = BetAmount::parse_display(" .5 ").unwrap();
        assert_eq!(leading_dot.to_display(), "0.5");
    }

    #[test]
    fn test_parse_display_rejects_bad_input() {
        for input in ["", "abc", "-1", "0", "0.0", "1e3", ".", "1.2.3", "NaN", "inf"] {
            assert!(
                matches!(
                    BetAmount::parse_display(input),
                    Err(CoreError::InvalidBetAmount(_))
                ),
                "accepted {:?}",
                input
            );
        }
        assert!(BetAmount::parse_display("1.0000000000000000001").is_err());
    }

    #[test]
    fn test_to_display_trims_zeros() {
        let one = BetAmount::from_wei(U256::exp10(18));
        assert_eq!(one.to_display(), "1.0");
        assert_eq!(one.to_string(), "1.0 ETH");

        let odd = BetAmount::parse_display("12.340").unwrap();
        assert_eq!(odd.to_display(), "12.34");
    }

    #[test]
    fn test_move_parsing() {
        assert_eq!("1".parse::<MoveChoice>().unwrap(), MoveChoice::Rock);
        assert_eq!(" Paper ".parse::<MoveChoice>().unwrap(), MoveChoice::Paper);
        assert_eq!("s".parse::<MoveChoice>().unwrap(), MoveChoice::Scissors);
        assert!(matches!(
            MoveChoice::try_from(0),
            Err(CoreError::InvalidMove(_))
        ));
        assert!("4".parse::<MoveChoice>().is_err());
        assert!("lizard".parse::<MoveChoice>().is_err());
        assert_eq!(MoveChoice::Scissors.wire(), 3);
    }

    #[test]
    fn test_secret_rules() {
        assert!(matches!(Secret::new(""), Err(CoreError::InvalidSecret(_))));
        let secret = Secret::new("hunter2").unwrap();
        assert_eq!(format!("{:?}", secret), "Secret(<redacted>)");
        assert!(Secret::new("x".repeat(Secret::MAX_LEN)).is_ok());
        assert!(matches!(
            Secret::new("x".repeat(Secret::MAX_LEN + 1)),
            Err(CoreError::InvalidSecret(_))
        ));
        // multi-byte characters count by encoded length
        assert!(Secret::new("é".repeat(Secret::MAX_LEN / 2 + 1)).is_err());
        assert_eq!(Secret::generate().expose().len(), 32);
    }

    #[test]
    fn test_snapshot_slots() {
        let a = Address::repeat_byte(0xaa);
        let b = Address::repeat_byte(0xbb);
        let one = BetAmount::parse_display("1").unwrap();

        let empty = SessionSnapshot::empty();
        assert!(empty.is_open_for_player1());
        assert_eq!(empty.slot_of(Address::zero()), None);

        let half = SessionSnapshot::new(a, Address::zero(), one);
        assert_eq!(half.slot_of(a), Some(Slot::Player1));
        assert_eq!(half.slot_of(b), None);
        assert!(!half.is_full());

        let full = SessionSnapshot::new(a, b, one);
        assert!(full.is_full());
        assert_eq!(full.slot_of(b), Some(Slot::Player2));

        assert!(!SessionSnapshot::new(Address::zero(), b, one).is_consistent());
    }

    #[test]
    fn test_commitment_hex_round_trip() {
        let commitment = Commitment::from_bytes([7u8; 32]);
        assert_eq!(Commitment::from_hex(&commitment.to_hex()).unwrap(), commitment);
        assert!(Commitment::from_hex("0x1234").is_err());
    }
}

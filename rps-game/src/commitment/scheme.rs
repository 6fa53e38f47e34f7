use ethers::utils::keccak256;
use rps_core::{Commitment, MoveChoice, Secret};

/// A hiding, binding commitment to a move.
///
/// Schemes differ only in how `(choice, secret)` is laid out before
/// hashing; the digest is always keccak-256.
pub trait CommitmentScheme {
    fn preimage(choice: MoveChoice, secret: &Secret) -> Vec<u8>;

    fn commit(choice: MoveChoice, secret: &Secret) -> Commitment {
        Commitment::from_bytes(keccak256(Self::preimage(choice, secret)))
    }

    fn verify(choice: MoveChoice, secret: &Secret, commitment: &Commitment) -> bool {
        Self::commit(choice, secret) == *commitment
    }
}

/// `keccak256(utf8("<move digit><secret>"))`, the layout the contract
/// recomputes on reveal.
///
/// There is no separator, but moves are always a single digit, so the first
/// byte is the move and the rest is the secret.
pub struct ConcatenatedKeccak;

impl CommitmentScheme for ConcatenatedKeccak {
    fn preimage(choice: MoveChoice, secret: &Secret) -> Vec<u8> {
        format!("{}{}", choice.wire(), secret.expose()).into_bytes()
    }
}

/// `keccak256(tag || move || u32_be(len(secret)) || secret)`.
pub struct LengthPrefixedKeccak;

impl LengthPrefixedKeccak {
    pub const DOMAIN_TAG: &'static [u8] = b"rps-commit-v1";
}

const _: () = assert!(Secret::MAX_LEN <= u32::MAX as usize);

impl CommitmentScheme for LengthPrefixedKeccak {
    fn preimage(choice: MoveChoice, secret: &Secret) -> Vec<u8> {
        let secret = secret.expose().as_bytes();
        let mut out = Vec::with_capacity(Self::DOMAIN_TAG.len() + 5 + secret.len());
        out.extend_from_slice(Self::DOMAIN_TAG);
        out.push(choice.wire());
        // Secret::new caps the length far below u32::MAX
        let len = u32::try_from(secret.len()).unwrap_or(u32::MAX);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(secret);
        out
    }
}

pub mod scheme;

pub use scheme::{CommitmentScheme, ConcatenatedKeccak, LengthPrefixedKeccak};

use rps_core::{Commitment, CommitmentEncoding, MoveChoice, Secret};

/// Commitment derivation for the configured encoding. Pure: no I/O, no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitmentCodec {
    encoding: CommitmentEncoding,
}

impl CommitmentCodec {
    pub fn new(encoding: CommitmentEncoding) -> Self {
        Self { encoding }
    }

    pub fn commit(&self, choice: MoveChoice, secret: &Secret) -> Commitment {
        match self.encoding {
            CommitmentEncoding::Concatenated => ConcatenatedKeccak::commit(choice, secret),
            CommitmentEncoding::LengthPrefixed => LengthPrefixedKeccak::commit(choice, secret),
        }
    }

    /// Local check before spending a reveal transaction.
    pub fn verify(&self, choice: MoveChoice, secret: &Secret, commitment: &Commitment) -> bool {
        self.commit(choice, secret) == *commitment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::utils::keccak256;
    use std::collections::HashSet;

    fn secret(s: &str) -> Secret {
        Secret::new(s).unwrap()
    }

    fn codecs() -> [CommitmentCodec; 2] {
        [
            CommitmentCodec::new(CommitmentEncoding::Concatenated),
            CommitmentCodec::new(CommitmentEncoding::LengthPrefixed),
        ]
    }

    #[test]
    fn test_concatenated_matches_contract_layout() {
        let codec = CommitmentCodec::default();
        let commitment = codec.commit(MoveChoice::Paper, &secret("hello"));
        assert_eq!(commitment.as_bytes(), &keccak256(b"2hello"));
    }

    #[test]
    fn test_commit_is_deterministic() {
        for codec in codecs() {
            for choice in MoveChoice::ALL {
                let s = secret("same secret");
                assert_eq!(codec.commit(choice, &s), codec.commit(choice, &s));
            }
        }
    }

    #[test]
    fn test_distinct_pairs_give_distinct_commitments() {
        let secrets = ["a", "b", "23", "3", "12", "ünïcödé", "a longer secret phrase"];
        for codec in codecs() {
            let mut seen = HashSet::new();
            for choice in MoveChoice::ALL {
                for s in secrets {
                    assert!(
                        seen.insert(codec.commit(choice, &secret(s))),
                        "collision for {:?} {:?}",
                        choice,
                        s
                    );
                }
            }
        }
    }

    #[test]
    fn test_verify() {
        for codec in codecs() {
            for choice in MoveChoice::ALL {
                let s = secret("s3cret");
                let commitment = codec.commit(choice, &s);
                assert!(codec.verify(choice, &s, &commitment));
                assert!(!codec.verify(choice, &secret("s3cre7"), &commitment));

                for other in MoveChoice::ALL.into_iter().filter(|m| *m != choice) {
                    assert!(!codec.verify(other, &s, &commitment));
                }
            }
        }
    }

    #[test]
    fn test_encodings_are_not_interchangeable() {
        let s = secret("x");
        let [concat, framed] = codecs();
        let commitment = concat.commit(MoveChoice::Rock, &s);
        assert!(!framed.verify(MoveChoice::Rock, &s, &commitment));
    }

    #[test]
    fn test_length_prefixed_layout() {
        let preimage = LengthPrefixedKeccak::preimage(MoveChoice::Scissors, &secret("ab"));
        let tag = LengthPrefixedKeccak::DOMAIN_TAG;
        assert_eq!(&preimage[..tag.len()], tag);
        assert_eq!(&preimage[tag.len()..], &[3, 0, 0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn test_length_prefix_of_longest_secret() {
        let longest = secret(&"z".repeat(Secret::MAX_LEN));
        let preimage = LengthPrefixedKeccak::preimage(MoveChoice::Rock, &longest);
        let tag = LengthPrefixedKeccak::DOMAIN_TAG.len();
        assert_eq!(&preimage[tag + 1..tag + 5], &[0, 0, 1, 0]);
        assert_eq!(preimage.len(), tag + 5 + Secret::MAX_LEN);
    }
}

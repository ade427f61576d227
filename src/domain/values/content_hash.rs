//! Content hashes used as partition and deduplication keys.
//!
//! Both hashes are hex-encoded SHA-256 digests over a canonical text form,
//! so equal content always yields the same key regardless of the order the
//! caller supplied it in.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifies one portfolio state; every search record is keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortfolioHash(String);

/// Identifies one ordered action list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceHash(String);

macro_rules! hash_newtype {
    ($name:ident) => {
        impl $name {
            /// Wrap an already-computed hex digest (e.g. read back from storage).
            pub fn from_hex(hex: impl Into<String>) -> Self {
                Self(hex.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First 12 hex characters, for log lines.
            pub fn short(&self) -> &str {
                &self.0[..self.0.len().min(12)]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

hash_newtype!(PortfolioHash);
hash_newtype!(SequenceHash);

impl PortfolioHash {
    pub(crate) fn digest(canonical: &str) -> Self {
        Self(sha256_hex(canonical))
    }
}

impl SequenceHash {
    pub(crate) fn digest(canonical: &str) -> Self {
        Self(sha256_hex(canonical))
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Render a float so the canonical text is stable across platforms.
///
/// `{:?}` gives the shortest representation that round-trips, and `-0.0`
/// is folded into `0.0` so sign noise cannot split a hash.
pub(crate) fn canonical_f64(v: f64) -> String {
    if v == 0.0 {
        return "0.0".to_string();
    }
    format!("{v:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_hex_sha256() {
        let h = PortfolioHash::digest("abc");
        assert_eq!(
            h.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(h.short(), "ba7816bf8f01");
    }

    #[test]
    fn test_canonical_f64_folds_negative_zero() {
        assert_eq!(canonical_f64(-0.0), canonical_f64(0.0));
        assert_eq!(canonical_f64(1.5), "1.5");
        assert_eq!(canonical_f64(10.0), "10.0");
    }
}

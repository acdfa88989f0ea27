//! SHA-256 hashing for action records, stored payloads, and merkle nodes.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Size of a SHA-256 hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Type alias for a 32-byte hash.
pub type Hash = [u8; HASH_SIZE];

/// Errors that can occur when parsing a hex-encoded hash.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashParseError {
    /// The string has the wrong length for a 32-byte hash.
    #[error("invalid hash length: expected {expected} hex characters, got {actual}")]
    InvalidLength {
        /// The expected number of hex characters.
        expected: usize,
        /// The actual number of characters.
        actual: usize,
    },

    /// The string contains a non-hexadecimal character.
    #[error("invalid hex character at offset {offset}")]
    InvalidCharacter {
        /// Byte offset of the offending character.
        offset: usize,
    },
}

/// Hasher for action records and merkle nodes.
///
/// All digests in this crate are SHA-256. The hasher is stateless; every
/// method is a pure function of its input bytes.
pub struct ActionHasher;

impl ActionHasher {
    /// Hashes raw content.
    ///
    /// Used for content identifiers and attestation leaf hashes.
    #[must_use]
    pub fn hash_content(content: &[u8]) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hasher.finalize().into()
    }

    /// Hashes two adjacent merkle nodes into their parent.
    ///
    /// The parent is `SHA-256(left || right)`. Both the prover and the
    /// verifier must combine nodes in this order.
    #[must_use]
    pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(left);
        hasher.update(right);
        hasher.finalize().into()
    }
}

/// Hex encoding and decoding for 32-byte hashes.
pub mod hex {
    use std::fmt::Write;

    use super::{HASH_SIZE, Hash, HashParseError};

    /// Encodes bytes as a lowercase hex string.
    #[must_use]
    pub fn encode(bytes: &[u8]) -> String {
        bytes
            .iter()
            .fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            })
    }

    /// Decodes a hex string into a 32-byte hash.
    ///
    /// A leading `0x` prefix is accepted and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`HashParseError`] if the string has the wrong length or
    /// contains a non-hexadecimal character.
    pub fn decode(s: &str) -> Result<Hash, HashParseError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        if stripped.len() != HASH_SIZE * 2 {
            return Err(HashParseError::InvalidLength {
                expected: HASH_SIZE * 2,
                actual: stripped.len(),
            });
        }

        let mut hash = [0u8; HASH_SIZE];
        for (i, chunk) in stripped.as_bytes().chunks(2).enumerate() {
            let high = nibble(chunk[0]).ok_or(HashParseError::InvalidCharacter { offset: i * 2 })?;
            let low =
                nibble(chunk[1]).ok_or(HashParseError::InvalidCharacter { offset: i * 2 + 1 })?;
            hash[i] = (high << 4) | low;
        }
        Ok(hash)
    }

    /// Converts a hex character to its nibble value.
    const fn nibble(c: u8) -> Option<u8> {
        match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        }
    }
}

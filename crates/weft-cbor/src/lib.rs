//! Canonical CBOR helpers and content digests.
//!
//! Everything that is hashed or persisted goes through [`to_canonical_cbor`],
//! which fixes map-key ordering so equal values always produce equal bytes.

use serde::Serialize;
use sha2::{Digest as _, Sha256};
use std::fmt;
use thiserror::Error;

/// Serializes a value as canonical CBOR (deterministic map-key order).
///
/// The value is normalized through [`serde_cbor::Value`] first; its maps are
/// ordered, so equal values always encode to identical bytes.
pub fn to_canonical_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_cbor::Error> {
    let normalized = serde_cbor::value::to_value(value)?;
    serde_cbor::to_vec(&normalized)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestParseError {
    #[error("invalid digest '{value}': expected 64 lowercase hex characters")]
    Invalid { value: String },
}

/// SHA-256 content address, rendered as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let out = hasher.finalize();
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&out);
        Digest(arr)
    }

    /// Digest of a value's canonical CBOR bytes.
    pub fn of_cbor<T: Serialize>(value: &T) -> Result<Self, serde_cbor::Error> {
        Ok(Self::of_bytes(&to_canonical_cbor(value)?))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(value: &str) -> Result<Self, DigestParseError> {
        if value.len() != 64 || !value.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(DigestParseError::Invalid {
                value: value.to_owned(),
            });
        }
        let bytes = hex::decode(value).map_err(|_| DigestParseError::Invalid {
            value: value.to_owned(),
        })?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Digest(arr))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

//! Content digest type used for deduplication and artifact keys
//!
//! Digests are SHA-256 hashes of the fetched bytes, stored as their raw
//! 32-byte representation and rendered as lowercase hex everywhere they
//! leave the process (logs, store keys, reputation lookups).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::store;

/// Error returned when parsing a digest from hex fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid content digest: {0}. Expected 64 hex characters")]
pub struct InvalidDigest(pub String);

/// SHA-256 content digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Hash a complete payload
    pub fn compute(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(hasher.finalize().into())
    }

    /// Parse a digest from a 64-character hex string (case insensitive)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use safezip::app::ContentDigest;
    ///
    /// let hex = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    /// let digest = ContentDigest::from_hex(&hex.to_uppercase()).unwrap();
    /// assert_eq!(digest, ContentDigest::compute(b"hello"));
    /// assert_eq!(digest.to_hex(), hex);
    /// ```
    pub fn from_hex(hex_str: &str) -> Result<Self, InvalidDigest> {
        if hex_str.len() != 64 {
            return Err(InvalidDigest(hex_str.to_string()));
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_str, &mut bytes)
            .map_err(|_| InvalidDigest(hex_str.to_string()))?;
        Ok(Self(bytes))
    }

    /// Lowercase hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Canonical store key of the finished archive for this content
    pub fn artifact_key(&self) -> String {
        format!("{}.{}", self.to_hex(), store::ARTIFACT_EXTENSION)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = InvalidDigest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Serialize as hex string for JSON compatibility
impl Serialize for ContentDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_string = String::deserialize(deserializer)?;
        Self::from_hex(&hex_string).map_err(serde::de::Error::custom)
    }
}

//! Core types for proof-of-work mining
//!
//! Fixed-width hashes, monetary amounts, reward addresses and hash rates with
//! validation, display and JSON serialization.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Monetary amount in base units
pub type Amount = u64;

/// 256-bit hash in internal byte order
///
/// The bytes are the raw digest output, which is also the little-endian
/// encoding of the hash read as an integer. Display and hex parsing use the
/// conventional reversed (big-endian) order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Size of a hash in bytes
    pub const SIZE: usize = 32;

    /// The all-zero hash, used as the parent of a genesis block
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Create from internal-order bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from a slice in internal order
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            Error::encoding(format!(
                "Invalid hash length: expected 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Get the internal-order bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex in internal order
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hex in display (reversed) order
    pub fn to_rhex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    /// Parse hex given in display (reversed) order
    pub fn from_rhex(s: &str) -> Result<Self> {
        let mut bytes = hex::decode(s)
            .map_err(|e| Error::encoding(format!("Invalid hash hex: {}", e)))?;
        bytes.reverse();
        Self::from_slice(&bytes)
    }

    /// Whether every byte is zero
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl FromStr for Hash256 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_rhex(s)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rhex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_rhex())
    }
}

impl Serialize for Hash256 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_rhex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash256::from_rhex(&s).map_err(serde::de::Error::custom)
    }
}

/// Reward address committed to by the coinbase
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create a new address, rejecting empty strings
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(Error::config("Reward address must not be empty"));
        }
        Ok(Self(address))
    }

    /// Get the address string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bytes embedded in the coinbase
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash rate in hashes per second
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct HashRate(pub f64);

impl HashRate {
    /// Create new hash rate
    pub fn new(rate: f64) -> Self {
        Self(rate)
    }

    /// Rate from a hash count and an elapsed time, clamping the time to one second
    pub fn from_hashes(hashes: u128, elapsed_secs: u64) -> Self {
        Self(hashes as f64 / elapsed_secs.max(1) as f64)
    }

    /// Get the rate value
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Rate in kilohashes per second
    pub fn khs(&self) -> f64 {
        self.0 / 1_000.0
    }
}

impl fmt::Display for HashRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000_000_000_000.0 {
            write!(f, "{:.2}T H/s", self.0 / 1_000_000_000_000.0)
        } else if self.0 >= 1_000_000_000.0 {
            write!(f, "{:.2}G H/s", self.0 / 1_000_000_000.0)
        } else if self.0 >= 1_000_000.0 {
            write!(f, "{:.2}M H/s", self.0 / 1_000_000.0)
        } else if self.0 >= 1_000.0 {
            write!(f, "{:.2}K H/s", self.0 / 1_000.0)
        } else {
            write!(f, "{:.2} H/s", self.0)
        }
    }
}

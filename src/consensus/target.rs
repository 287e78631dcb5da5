//! 256-bit proof-of-work targets
//!
//! A target is an unsigned integer of at most 256 bits. A block hash, read as
//! a little-endian integer, satisfies the target when it is not greater than
//! it.

use super::compact::CompactBits;
use crate::crypto::hash_meets_target;
use crate::error::{Error, Result};
use crate::Hash256;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use once_cell::sync::Lazy;
use std::fmt;

/// `2^256`, the numerator of the per-block proof
pub static MAX_CHAINWORK: Lazy<BigUint> = Lazy::new(|| BigUint::one() << 256usize);

/// Unsigned 256-bit mining target
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target(BigUint);

impl Target {
    /// Create a target, rejecting values wider than 256 bits
    pub fn new(value: BigUint) -> Result<Self> {
        if value.bits() > 256 {
            return Err(Error::invalid_target(format!(
                "Target is {} bits wide, limit is 256",
                value.bits()
            )));
        }
        Ok(Self(value))
    }

    /// The zero target, which no hash satisfies except the zero hash
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// The easiest possible target, `2^256 - 1`
    pub fn max() -> Self {
        Self(&*MAX_CHAINWORK - BigUint::one())
    }

    /// Create from 32 little-endian bytes
    pub fn from_le_bytes(bytes: &[u8; 32]) -> Self {
        Self(BigUint::from_bytes_le(bytes))
    }

    /// Encode as 32 little-endian bytes
    pub fn to_le_bytes(&self) -> [u8; 32] {
        let bytes = self.0.to_bytes_le();
        let mut out = [0u8; 32];
        out[..bytes.len()].copy_from_slice(&bytes);
        out
    }

    /// Big-endian hex, zero padded to 64 characters
    pub fn to_hex_be(&self) -> String {
        let mut bytes = self.to_le_bytes();
        bytes.reverse();
        hex::encode(bytes)
    }

    /// Parse 64 big-endian hex characters
    pub fn from_hex_be(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| Error::invalid_target(format!("Invalid hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(Error::invalid_target(format!(
                "Expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(BigUint::from_bytes_be(&bytes)))
    }

    /// The underlying integer
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Bit length of the target
    pub fn bits(&self) -> u64 {
        self.0.bits()
    }

    /// Whether the target is usable for proof of work (non-zero)
    pub fn is_valid(&self) -> bool {
        !self.0.is_zero()
    }

    /// Whether `hash <= target`
    pub fn is_met_by(&self, hash: &Hash256) -> bool {
        hash_meets_target(hash.as_bytes(), &self.to_le_bytes())
    }

    /// Expected work to find a hash under this target: `2^256 / (target + 1)`
    pub fn proof(&self) -> BigUint {
        &*MAX_CHAINWORK / (&self.0 + BigUint::one())
    }

    /// Compact encoding of this target
    pub fn to_compact(&self) -> CompactBits {
        CompactBits::from_target(self)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_be())
    }
}

//! Compact difficulty encoding
//!
//! A 32-bit floating-point-like representation of a 256-bit target: bits
//! 24-31 hold the byte length, bit 23 the sign and bits 0-22 the mantissa.
//! Decoding is signed so that negative and oversized encodings are visible to
//! the caller; every consumer that needs a usable target goes through
//! [`CompactBits::to_target`] or [`verify_pow`].

use super::target::{Target, MAX_CHAINWORK};
use crate::error::{Error, Result};
use crate::Hash256;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

const SIGN_BIT: u32 = 0x0080_0000;
const MANTISSA_MASK: u32 = 0x007f_ffff;

/// Compact ("nBits") encoding of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompactBits(pub u32);

impl CompactBits {
    /// Wrap a raw compact value
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw 32-bit value
    pub fn value(self) -> u32 {
        self.0
    }

    /// Expand to a signed integer
    pub fn decode(self) -> BigInt {
        if self.0 == 0 {
            return BigInt::zero();
        }

        let exponent = self.0 >> 24;
        let negative = self.0 & SIGN_BIT != 0;
        let mantissa = self.0 & MANTISSA_MASK;

        let magnitude = if exponent <= 3 {
            BigUint::from(mantissa >> (8 * (3 - exponent)))
        } else {
            BigUint::from(mantissa) << (8 * (exponent - 3)) as usize
        };

        let sign = if negative { Sign::Minus } else { Sign::Plus };
        BigInt::from_biguint(sign, magnitude)
    }

    /// Compact form of a signed integer
    ///
    /// Fails only when the byte length does not fit the 8-bit exponent.
    pub fn encode(value: &BigInt) -> Result<Self> {
        if value.is_zero() {
            return Ok(Self(0));
        }

        let (exponent, mantissa) = pack(value.magnitude());
        if exponent > 0xff {
            return Err(Error::invalid_target(format!(
                "Value is {} bytes wide, compact exponent holds at most 255",
                exponent
            )));
        }

        let mut compact = ((exponent as u32) << 24) | mantissa;
        if value.sign() == Sign::Minus {
            compact |= SIGN_BIT;
        }
        Ok(Self(compact))
    }

    /// Compact form of an unsigned target
    pub fn from_target(target: &Target) -> Self {
        if !target.is_valid() {
            return Self(0);
        }
        // A 256-bit target is at most 33 bytes after normalisation.
        let (exponent, mantissa) = pack(target.as_biguint());
        Self(((exponent as u32) << 24) | mantissa)
    }

    /// Decode into a usable target
    ///
    /// Zero, negative and wider-than-256-bit encodings are rejected.
    pub fn to_target(self) -> Result<Target> {
        let value = self.decode();
        match value.sign() {
            Sign::Plus => Target::new(value.magnitude().clone()),
            Sign::NoSign => Err(Error::invalid_target(format!("{} decodes to zero", self))),
            Sign::Minus => Err(Error::invalid_target(format!("{} is negative", self))),
        }
    }

    /// Work contributed by a block with these bits
    ///
    /// Zero or negative targets contribute no work.
    pub fn proof(self) -> BigUint {
        let value = self.decode();
        if value.sign() != Sign::Plus {
            return BigUint::zero();
        }
        &*MAX_CHAINWORK / (value.magnitude() + BigUint::one())
    }

    /// Check a hash against these bits
    pub fn verify(self, hash: &Hash256) -> bool {
        verify_pow(hash, self)
    }
}

impl fmt::Display for CompactBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<u32> for CompactBits {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

/// Byte-length exponent and normalised 23-bit mantissa of a magnitude
fn pack(magnitude: &BigUint) -> (u64, u32) {
    let mut exponent = (magnitude.bits() + 7) / 8;

    let mut mantissa = if exponent <= 3 {
        let small = magnitude.to_u32().unwrap_or(0);
        small << (8 * (3 - exponent))
    } else {
        let shifted: BigUint = magnitude >> (8 * (exponent - 3)) as usize;
        shifted.to_u32().unwrap_or(0)
    };

    // The sign bit would be set, so move one byte into the exponent.
    if mantissa & SIGN_BIT != 0 {
        mantissa >>= 8;
        exponent += 1;
    }

    (exponent, mantissa)
}

/// Whether `hash` satisfies the target encoded in `bits`
///
/// Zero, negative and wider-than-256-bit targets never verify. The hash is
/// read as a little-endian integer and must not exceed the target.
pub fn verify_pow(hash: &Hash256, bits: CompactBits) -> bool {
    let target = bits.decode();

    if target.sign() != Sign::Plus {
        return false;
    }

    if target.bits() > 256 {
        return false;
    }

    BigUint::from_bytes_le(hash.as_bytes()) <= *target.magnitude()
}

//! Cryptographic utilities for mining
//!
//! Double SHA-256 hashing and the reverse byte-order comparison used to test a
//! hash against a target.

use crate::Hash256;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;

/// Reusable double SHA-256 hasher
pub struct Sha256dHasher {
    hasher: Sha256,
}

impl Sha256dHasher {
    /// Create a new hasher
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Hash data twice with SHA-256
    pub fn hash(&mut self, data: &[u8]) -> [u8; 32] {
        self.hasher.update(data);
        let first = self.hasher.finalize_reset();
        self.hasher.update(first);
        self.hasher.finalize_reset().into()
    }
}

impl Default for Sha256dHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Double SHA-256 of `data`
pub fn sha256d(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    Hash256(Sha256::digest(first).into())
}

/// Compare two 32-byte little-endian integers, most significant byte last
pub fn rcmp(a: &[u8; 32], b: &[u8; 32]) -> Ordering {
    for i in (0..32).rev() {
        match a[i].cmp(&b[i]) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Whether `hash <= target`, both in little-endian byte order
#[inline]
pub fn hash_meets_target(hash: &[u8; 32], target: &[u8; 32]) -> bool {
    rcmp(hash, target) != Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256d_known_vector() {
        // sha256d("hello")
        let hash = sha256d(b"hello");
        assert_eq!(
            hash.to_hex(),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
    }

    #[test]
    fn test_hasher_matches_function() {
        let mut hasher = Sha256dHasher::new();
        let a = hasher.hash(b"block header");
        let b = hasher.hash(b"block header");
        assert_eq!(a, b);
        assert_eq!(Hash256(a), sha256d(b"block header"));
        assert_ne!(hasher.hash(b"other"), a);
    }

    #[test]
    fn test_rcmp_uses_last_byte_as_most_significant() {
        let mut low = [0xffu8; 32];
        low[31] = 0x00;
        let mut high = [0u8; 32];
        high[31] = 0x01;
        assert_eq!(rcmp(&low, &high), Ordering::Less);
        assert_eq!(rcmp(&high, &low), Ordering::Greater);
        assert_eq!(rcmp(&high, &high), Ordering::Equal);
    }

    #[test]
    fn test_hash_meets_target_inclusive() {
        let target = [0x10u8; 32];
        assert!(hash_meets_target(&target, &target));

        let mut above = target;
        above[0] = 0x11;
        assert!(!hash_meets_target(&above, &target));

        let mut below = target;
        below[31] = 0x0f;
        below[0] = 0xff;
        assert!(hash_meets_target(&below, &target));
    }
}

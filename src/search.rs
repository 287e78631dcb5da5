//! Nonce search primitive
//!
//! Scans an inclusive nonce range over a serialized header, returning the
//! first nonce whose double SHA-256 does not exceed the target. This is the
//! hot loop: the target bytes are computed once and nothing is allocated per
//! nonce.

use crate::consensus::header::{set_nonce, HEADER_SIZE};
use crate::consensus::Target;
use crate::crypto::{hash_meets_target, Sha256dHasher};

/// Search `min..=max` for a nonce satisfying `target`
///
/// The nonce field of `header` is left holding the last nonce tried.
pub fn search(header: &mut [u8; HEADER_SIZE], target: &Target, min: u32, max: u32) -> Option<u32> {
    search_bytes(header, &target.to_le_bytes(), min, max)
}

/// [`search`] with a pre-encoded little-endian target
pub fn search_bytes(
    header: &mut [u8; HEADER_SIZE],
    target: &[u8; 32],
    min: u32,
    max: u32,
) -> Option<u32> {
    if min > max {
        return None;
    }

    let mut hasher = Sha256dHasher::new();
    let mut nonce = min;

    loop {
        set_nonce(header, nonce);
        let hash = hasher.hash(&header[..]);

        if hash_meets_target(&hash, target) {
            return Some(nonce);
        }

        if nonce == max {
            return None;
        }
        nonce += 1;
    }
}

/// Whether `nonce` solves `header` for `target`
pub fn check_nonce(header: &[u8; HEADER_SIZE], target: &Target, nonce: u32) -> bool {
    let mut data = *header;
    set_nonce(&mut data, nonce);
    target.is_met_by(&crate::crypto::sha256d(&data))
}

//! 80-byte block header
//!
//! Layout, all integers little-endian:
//! `[version:4][prev_block:32][merkle_root:32][time:4][bits:4][nonce:4]`.

use super::compact::CompactBits;
use crate::crypto::sha256d;
use crate::error::{Error, Result};
use crate::Hash256;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Serialized header size
pub const HEADER_SIZE: usize = 80;

/// Offset of the nonce field within the serialized header
pub const NONCE_OFFSET: usize = 76;

/// Proof-of-work block header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block version
    pub version: u32,
    /// Hash of the parent block
    pub prev_block: Hash256,
    /// Merkle root of the block's transactions
    pub merkle_root: Hash256,
    /// Timestamp in seconds since the Unix epoch
    pub time: u32,
    /// Compact target
    pub bits: CompactBits,
    /// Proof-of-work nonce
    pub nonce: u32,
}

impl BlockHeader {
    /// Serialize to 80 bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        write_header(
            &mut buf,
            self.version,
            &self.prev_block,
            &self.merkle_root,
            self.time,
            self.bits,
            self.nonce,
        );
        buf
    }

    /// Parse from the first 80 bytes of `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::encoding(format!(
                "Header needs {} bytes, got {}",
                HEADER_SIZE,
                data.len()
            )));
        }

        Ok(Self {
            version: LittleEndian::read_u32(&data[0..4]),
            prev_block: Hash256::from_slice(&data[4..36])?,
            merkle_root: Hash256::from_slice(&data[36..68])?,
            time: LittleEndian::read_u32(&data[68..72]),
            bits: CompactBits(LittleEndian::read_u32(&data[72..76])),
            nonce: LittleEndian::read_u32(&data[76..80]),
        })
    }

    /// Double SHA-256 of the serialized header
    pub fn hash(&self) -> Hash256 {
        sha256d(&self.to_bytes())
    }

    /// Whether the header hash satisfies its own bits
    pub fn verify_pow(&self) -> bool {
        self.bits.verify(&self.hash())
    }
}

/// Write header fields into an 80-byte buffer
pub fn write_header(
    buf: &mut [u8; HEADER_SIZE],
    version: u32,
    prev_block: &Hash256,
    merkle_root: &Hash256,
    time: u32,
    bits: CompactBits,
    nonce: u32,
) {
    LittleEndian::write_u32(&mut buf[0..4], version);
    buf[4..36].copy_from_slice(prev_block.as_bytes());
    buf[36..68].copy_from_slice(merkle_root.as_bytes());
    LittleEndian::write_u32(&mut buf[68..72], time);
    LittleEndian::write_u32(&mut buf[72..76], bits.value());
    LittleEndian::write_u32(&mut buf[76..80], nonce);
}

/// Overwrite the nonce field of a serialized header
#[inline]
pub fn set_nonce(buf: &mut [u8; HEADER_SIZE], nonce: u32) {
    LittleEndian::write_u32(&mut buf[NONCE_OFFSET..HEADER_SIZE], nonce);
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sample() -> BlockHeader {
        BlockHeader {
            version: 0x2000_0000,
            prev_block: Hash256([1u8; 32]),
            merkle_root: Hash256([2u8; 32]),
            time: 1_700_000_000,
            bits: CompactBits(0x207f_ffff),
            nonce: 0xdead_beef,
        }
    }

    #[test]
    fn test_layout() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x00, 0x20]);
        assert_eq!(&bytes[4..36], &[1u8; 32]);
        assert_eq!(&bytes[36..68], &[2u8; 32]);
        assert_eq!(&bytes[72..76], &[0xff, 0xff, 0x7f, 0x20]);
        assert_eq!(&bytes[76..80], &[0xef, 0xbe, 0xad, 0xde]);
        assert_eq!(BlockHeader::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_set_nonce() {
        let mut bytes = sample().to_bytes();
        set_nonce(&mut bytes, 7);
        let parsed = BlockHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.nonce, 7);
        assert_ne!(parsed.hash(), sample().hash());
    }

    #[test]
    fn test_short_input() {
        assert_matches!(BlockHeader::from_bytes(&[0u8; 79]), Err(Error::Encoding { .. }));
    }
}

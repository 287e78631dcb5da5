//! Chain entries and cumulative work
//!
//! A [`ChainEntry`] is the immutable record of a block header together with
//! its height and the total work of the chain ending at it. Best-chain
//! selection compares entries by chainwork alone.

use crate::consensus::{has_bit, has_unknown, BlockHeader, CompactBits, Network, HEADER_SIZE};
use crate::crypto::sha256d;
use crate::error::{Error, Result};
use crate::miner::Block;
use crate::Hash256;
use byteorder::{ByteOrder, LittleEndian};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Serialized entry size: 80-byte header, 4-byte height, 32-byte chainwork
pub const ENTRY_SIZE: usize = HEADER_SIZE + 4 + 32;

/// Block header annotated with height and cumulative chainwork
///
/// Fields are only set by the constructors, which keep chainwork within
/// 256 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    hash: Hash256,
    version: u32,
    prev_block: Hash256,
    merkle_root: Hash256,
    time: u32,
    bits: CompactBits,
    nonce: u32,
    height: u32,
    chainwork: BigUint,
}

impl ChainEntry {
    /// Build an entry from a header and its parent
    ///
    /// Without a parent the header is treated as genesis: height 0 and
    /// chainwork equal to its own proof.
    pub fn from_header(header: &BlockHeader, prev: Option<&ChainEntry>) -> Result<Self> {
        let proof = header.bits.proof();
        let (height, chainwork) = match prev {
            Some(prev) => {
                let height = prev.height.checked_add(1).ok_or_else(|| {
                    Error::encoding("Chain height overflows 32 bits")
                })?;
                (height, &prev.chainwork + proof)
            }
            None => (0, proof),
        };

        if chainwork.bits() > 256 {
            return Err(Error::encoding("Chainwork exceeds 256 bits"));
        }

        Ok(Self {
            hash: header.hash(),
            version: header.version,
            prev_block: header.prev_block,
            merkle_root: header.merkle_root,
            time: header.time,
            bits: header.bits,
            nonce: header.nonce,
            height,
            chainwork,
        })
    }

    /// Build an entry from a block and its parent
    pub fn from_block(block: &Block, prev: Option<&ChainEntry>) -> Result<Self> {
        Self::from_header(&block.header, prev)
    }

    /// Block hash
    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    /// Block version
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Parent hash
    pub fn prev_block(&self) -> Hash256 {
        self.prev_block
    }

    /// Merkle root
    pub fn merkle_root(&self) -> Hash256 {
        self.merkle_root
    }

    /// Block timestamp
    pub fn time(&self) -> u32 {
        self.time
    }

    /// Compact target
    pub fn bits(&self) -> CompactBits {
        self.bits
    }

    /// Proof-of-work nonce
    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    /// Distance from genesis
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total work from genesis up to and including this block
    pub fn chainwork(&self) -> &BigUint {
        &self.chainwork
    }

    /// The header fields of this entry
    pub fn to_header(&self) -> BlockHeader {
        BlockHeader {
            version: self.version,
            prev_block: self.prev_block,
            merkle_root: self.merkle_root,
            time: self.time,
            bits: self.bits,
            nonce: self.nonce,
        }
    }

    /// Whether this is the first block of the chain
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }

    /// Work contributed by this block alone
    pub fn proof(&self) -> BigUint {
        self.bits.proof()
    }

    /// Hash in display order
    pub fn rhash(&self) -> String {
        self.hash.to_rhex()
    }

    /// Compare by chainwork
    pub fn cmp_work(&self, other: &ChainEntry) -> Ordering {
        self.chainwork.cmp(&other.chainwork)
    }

    /// Whether this entry's chain carries strictly more work
    pub fn has_more_work_than(&self, other: &ChainEntry) -> bool {
        self.cmp_work(other) == Ordering::Greater
    }

    /// Whether the version signals for deployment `bit`
    pub fn has_bit(&self, bit: u8) -> bool {
        has_bit(self.version, bit)
    }

    /// Whether the version signals a deployment unknown to `network`
    pub fn has_unknown(&self, network: &Network) -> bool {
        has_unknown(self.version, network.unknown_bits())
    }

    /// Serialize to the 116-byte record
    pub fn to_raw(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[..HEADER_SIZE].copy_from_slice(&self.to_header().to_bytes());
        LittleEndian::write_u32(&mut buf[80..84], self.height);

        let work = self.chainwork.to_bytes_le();
        buf[84..84 + work.len()].copy_from_slice(&work);
        buf
    }

    /// Parse a 116-byte record, recomputing the hash from its header
    pub fn from_raw(data: &[u8]) -> Result<Self> {
        if data.len() != ENTRY_SIZE {
            return Err(Error::encoding(format!(
                "Chain entry must be {} bytes, got {}",
                ENTRY_SIZE,
                data.len()
            )));
        }

        let header = BlockHeader::from_bytes(&data[..HEADER_SIZE])?;

        Ok(Self {
            hash: sha256d(&data[..HEADER_SIZE]),
            version: header.version,
            prev_block: header.prev_block,
            merkle_root: header.merkle_root,
            time: header.time,
            bits: header.bits,
            nonce: header.nonce,
            height: LittleEndian::read_u32(&data[80..84]),
            chainwork: BigUint::from_bytes_le(&data[84..ENTRY_SIZE]),
        })
    }

    /// JSON view with display-order hashes
    pub fn to_json(&self) -> ChainEntryJson {
        let mut work = [0u8; 32];
        let bytes = self.chainwork.to_bytes_be();
        work[32 - bytes.len()..].copy_from_slice(&bytes);

        ChainEntryJson {
            hash: self.hash,
            version: self.version,
            prev_block: self.prev_block,
            merkle_root: self.merkle_root,
            time: self.time,
            bits: self.bits.value(),
            nonce: self.nonce,
            height: self.height,
            chainwork: hex::encode(work),
        }
    }

    /// Rebuild from the JSON view
    pub fn from_json(json: &ChainEntryJson) -> Result<Self> {
        let work = hex::decode(&json.chainwork)
            .map_err(|e| Error::encoding(format!("Invalid chainwork hex: {}", e)))?;
        if work.len() > 32 {
            return Err(Error::encoding("Chainwork exceeds 256 bits"));
        }

        Ok(Self {
            hash: json.hash,
            version: json.version,
            prev_block: json.prev_block,
            merkle_root: json.merkle_root,
            time: json.time,
            bits: CompactBits(json.bits),
            nonce: json.nonce,
            height: json.height,
            chainwork: BigUint::from_bytes_be(&work),
        })
    }
}

/// JSON representation of a [`ChainEntry`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEntryJson {
    /// Block hash, display order
    pub hash: Hash256,
    /// Block version
    pub version: u32,
    /// Parent hash, display order
    pub prev_block: Hash256,
    /// Merkle root, display order
    pub merkle_root: Hash256,
    /// Block timestamp
    pub time: u32,
    /// Compact target
    pub bits: u32,
    /// Proof-of-work nonce
    pub nonce: u32,
    /// Distance from genesis
    pub height: u32,
    /// Cumulative work as 64 hex characters
    pub chainwork: String,
}

impl Serialize for ChainEntry {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChainEntry {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let json = ChainEntryJson::deserialize(deserializer)?;
        ChainEntry::from_json(&json).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use num_traits::One;

    fn genesis() -> ChainEntry {
        ChainEntry::from_header(&Network::main().genesis, None).unwrap()
    }

    fn child_of(prev: &ChainEntry, bits: u32) -> ChainEntry {
        let header = BlockHeader {
            version: 0x2000_0000,
            prev_block: prev.hash(),
            merkle_root: Hash256([9u8; 32]),
            time: prev.time() + 600,
            bits: CompactBits(bits),
            nonce: 42,
        };
        ChainEntry::from_header(&header, Some(prev)).unwrap()
    }

    #[test]
    fn test_genesis_entry() {
        let entry = genesis();
        assert!(entry.is_genesis());
        assert_eq!(entry.chainwork(), &BigUint::from(0x1_0001_0001u64));
        assert_eq!(
            entry.rhash(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
    }

    #[test]
    fn test_chainwork_accumulates() {
        let root = genesis();
        let child = child_of(&root, 0x1d00_ffff);
        let grandchild = child_of(&child, 0x1c00_ffff);

        assert_eq!(child.height(), 1);
        assert_eq!(grandchild.height(), 2);
        assert_eq!(child.chainwork(), &(root.chainwork() + child.proof()));
        assert_eq!(grandchild.chainwork(), &(child.chainwork() + grandchild.proof()));
        assert!(grandchild.has_more_work_than(&child));
        assert_eq!(child.cmp_work(&child.clone()), Ordering::Equal);
        assert!(!child.has_more_work_than(&child.clone()));
    }

    #[test]
    fn test_zero_bits_add_no_work() {
        let root = genesis();
        let child = child_of(&root, 0);
        assert_eq!(child.chainwork(), root.chainwork());
    }

    #[test]
    fn test_raw_layout() {
        let entry = child_of(&genesis(), 0x1d00_ffff);
        let raw = entry.to_raw();
        assert_eq!(raw.len(), 116);
        assert_eq!(&raw[..80], &entry.to_header().to_bytes());
        assert_eq!(&raw[80..84], &1u32.to_le_bytes());
        assert_eq!(&BigUint::from_bytes_le(&raw[84..]), entry.chainwork());

        let parsed = ChainEntry::from_raw(&raw).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_from_raw_recomputes_hash() {
        let entry = genesis();
        let parsed = ChainEntry::from_raw(&entry.to_raw()).unwrap();
        assert_eq!(parsed.hash(), Network::main().genesis_hash());
    }

    #[test]
    fn test_from_raw_length() {
        assert_matches!(ChainEntry::from_raw(&[0u8; 115]), Err(Error::Encoding { .. }));
        assert_matches!(ChainEntry::from_raw(&[0u8; 117]), Err(Error::Encoding { .. }));
    }

    fn saturated() -> ChainEntry {
        let mut raw = genesis().to_raw();
        raw[84..].fill(0xff);
        ChainEntry::from_raw(&raw).unwrap()
    }

    #[test]
    fn test_chainwork_overflow_rejected() {
        let prev = saturated();
        let header = BlockHeader {
            prev_block: prev.hash(),
            ..Network::main().genesis
        };
        assert_matches!(
            ChainEntry::from_header(&header, Some(&prev)),
            Err(Error::Encoding { .. })
        );
    }

    #[test]
    fn test_full_width_chainwork_serializes() {
        let entry = saturated();
        let max = (BigUint::one() << 256usize) - BigUint::one();
        assert_eq!(entry.chainwork(), &max);

        let raw = entry.to_raw();
        assert!(raw[84..].iter().all(|&b| b == 0xff));
        assert_eq!(ChainEntry::from_raw(&raw).unwrap(), entry);

        let json = entry.to_json();
        assert_eq!(json.chainwork, "ff".repeat(32));
        assert_eq!(ChainEntry::from_json(&json).unwrap(), entry);
    }

    #[test]
    fn test_oversized_json_chainwork_rejected() {
        let mut json = genesis().to_json();
        json.chainwork = format!("01{}", "00".repeat(32));
        assert_matches!(ChainEntry::from_json(&json), Err(Error::Encoding { .. }));
    }

    #[test]
    fn test_json() {
        let entry = genesis();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json["hash"],
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
        assert_eq!(json["prevBlock"], "00".repeat(32));
        assert_eq!(json["bits"], 0x1d00_ffff);
        assert_eq!(
            json["chainwork"],
            "0000000000000000000000000000000000000000000000000000000100010001"
        );

        let parsed: ChainEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_version_bits() {
        let with_version = |version: u32| {
            let header = BlockHeader {
                version,
                ..Network::main().genesis
            };
            ChainEntry::from_header(&header, None).unwrap()
        };

        assert!(!genesis().has_bit(0));
        let signalling = with_version(0x2000_0001);
        assert!(signalling.has_bit(0));
        assert!(!signalling.has_unknown(&Network::main()));
        assert!(with_version(0x2000_0010).has_unknown(&Network::main()));
    }
}

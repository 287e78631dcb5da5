//! Mining engine and its collaborator contracts
//!
//! The engine pulls candidate blocks from a [`TemplateBuilder`], searches their
//! nonce space through a [`NonceSearcher`](crate::worker::NonceSearcher) and
//! hands solved blocks to a [`ChainAcceptor`].

use crate::chain::ChainEntry;
use crate::consensus::{BlockHeader, CompactBits, Target, HEADER_SIZE};
use crate::crypto::sha256d;
use crate::error::Result;
use crate::{Address, Hash256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod engine;
pub mod events;
pub mod job;
pub mod template;

pub use engine::{EngineState, MinerOptions, MiningEngine, INTERVAL};
pub use events::{MinerEvent, MiningStatus};
pub use job::{ExtraNonce, MiningJob};
pub use template::{merkle_root, SimpleTemplate};

/// A block: header plus raw transactions, coinbase first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block header
    pub header: BlockHeader,
    /// Serialized transactions
    pub transactions: Vec<Vec<u8>>,
}

impl Block {
    /// Block hash
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Merkle root computed from the transactions
    pub fn compute_merkle_root(&self) -> Hash256 {
        let hashes: Vec<Hash256> = self.transactions.iter().map(|tx| sha256d(tx)).collect();
        merkle_root(&hashes)
    }

    /// The coinbase transaction, if any
    pub fn coinbase(&self) -> Option<&[u8]> {
        self.transactions.first().map(Vec::as_slice)
    }
}

/// Solution data needed to commit a template into a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockProof {
    /// First extra-nonce word
    pub nonce1: u32,
    /// Second extra-nonce word
    pub nonce2: u32,
    /// Header timestamp
    pub time: u32,
    /// Header nonce
    pub nonce: u32,
    /// Resulting header hash
    pub hash: Hash256,
}

/// A candidate block whose nonce space is being searched
///
/// Changing the extra-nonce pair changes the coinbase and therefore the
/// merkle root, giving a fresh 32-bit nonce space.
pub trait BlockTemplate: Send + Sync + fmt::Debug {
    /// Target the block hash must meet
    fn target(&self) -> &Target;

    /// Compact form of the target
    fn bits(&self) -> CompactBits;

    /// Height of the block being built
    fn height(&self) -> u32;

    /// Hash of the parent block
    fn prev_block(&self) -> Hash256;

    /// Header timestamp
    fn time(&self) -> u32;

    /// Merkle root for an extra-nonce pair
    fn merkle_root(&self, nonce1: u32, nonce2: u32) -> Hash256;

    /// Serialized header for a merkle root, time and nonce
    fn header(&self, merkle_root: &Hash256, time: u32, nonce: u32) -> [u8; HEADER_SIZE];

    /// Proof for a solved nonce
    fn proof(&self, nonce1: u32, nonce2: u32, time: u32, nonce: u32) -> BlockProof {
        let root = self.merkle_root(nonce1, nonce2);
        let header = self.header(&root, time, nonce);
        BlockProof {
            nonce1,
            nonce2,
            time,
            nonce,
            hash: sha256d(&header),
        }
    }

    /// Assemble the final block
    fn commit(&self, proof: &BlockProof) -> Result<Block>;
}

/// Builds block templates on top of a chain tip
#[async_trait]
pub trait TemplateBuilder: Send + Sync {
    /// Build a template extending `tip` (the best tip when `None`)
    async fn build(
        &self,
        tip: Option<&ChainEntry>,
        address: Option<&Address>,
    ) -> Result<Box<dyn BlockTemplate>>;
}

/// Accepts solved blocks into a chain
#[async_trait]
pub trait ChainAcceptor: Send + Sync {
    /// Submit a block
    ///
    /// Returns `Ok(None)` when the block's parent is no longer the tip and
    /// `Err(Error::Verification { .. })` when the block is invalid.
    async fn submit(&self, block: &Block) -> Result<Option<ChainEntry>>;
}

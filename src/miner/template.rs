//! Simple block template
//!
//! A template whose coinbase commits to the height, the extra-nonce pair, the
//! subsidy and the reward address, followed by a fixed list of transactions.

use super::{Block, BlockProof, BlockTemplate};
use crate::chain::ChainEntry;
use crate::consensus::header::write_header;
use crate::consensus::{CompactBits, Target, HEADER_SIZE};
use crate::crypto::sha256d;
use crate::error::{Error, Result};
use crate::{Address, Amount, Hash256};
use byteorder::{LittleEndian, WriteBytesExt};

/// Merkle root over transaction hashes, duplicating the last hash on odd levels
pub fn merkle_root(hashes: &[Hash256]) -> Hash256 {
    if hashes.is_empty() {
        return Hash256::ZERO;
    }

    let mut level: Vec<Hash256> = hashes.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().copied() {
                level.push(last);
            }
        }

        level = level
            .chunks(2)
            .map(|pair| {
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(pair[0].as_bytes());
                buf[32..].copy_from_slice(pair[1].as_bytes());
                sha256d(&buf)
            })
            .collect();
    }

    level[0]
}

/// Block template with an extra-nonce coinbase
#[derive(Debug, Clone)]
pub struct SimpleTemplate {
    version: u32,
    prev_block: Hash256,
    height: u32,
    time: u32,
    bits: CompactBits,
    target: Target,
    reward: Amount,
    address: Option<Address>,
    transactions: Vec<Vec<u8>>,
    tx_hashes: Vec<Hash256>,
}

impl SimpleTemplate {
    /// Create a template extending `prev`
    pub fn new(
        prev: &ChainEntry,
        version: u32,
        time: u32,
        bits: CompactBits,
        reward: Amount,
        address: Option<Address>,
        transactions: Vec<Vec<u8>>,
    ) -> Result<Self> {
        let target = bits.to_target()?;
        let height = prev
            .height()
            .checked_add(1)
            .ok_or_else(|| Error::template("Chain height overflows 32 bits"))?;
        let tx_hashes = transactions.iter().map(|tx| sha256d(tx)).collect();

        Ok(Self {
            version,
            prev_block: prev.hash(),
            height,
            time,
            bits,
            target,
            reward,
            address,
            transactions,
            tx_hashes,
        })
    }

    /// Subsidy paid by the coinbase
    pub fn reward(&self) -> Amount {
        self.reward
    }

    /// Serialized coinbase for an extra-nonce pair
    pub fn coinbase(&self, nonce1: u32, nonce2: u32) -> Vec<u8> {
        let address = self.address.as_ref().map(Address::as_bytes).unwrap_or(&[]);
        let mut tx = Vec::with_capacity(20 + address.len());
        // Writing into a Vec cannot fail.
        let _ = tx.write_u32::<LittleEndian>(self.height);
        let _ = tx.write_u32::<LittleEndian>(nonce1);
        let _ = tx.write_u32::<LittleEndian>(nonce2);
        let _ = tx.write_u64::<LittleEndian>(self.reward);
        tx.extend_from_slice(address);
        tx
    }
}

impl BlockTemplate for SimpleTemplate {
    fn target(&self) -> &Target {
        &self.target
    }

    fn bits(&self) -> CompactBits {
        self.bits
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn prev_block(&self) -> Hash256 {
        self.prev_block
    }

    fn time(&self) -> u32 {
        self.time
    }

    fn merkle_root(&self, nonce1: u32, nonce2: u32) -> Hash256 {
        let mut hashes = Vec::with_capacity(self.tx_hashes.len() + 1);
        hashes.push(sha256d(&self.coinbase(nonce1, nonce2)));
        hashes.extend_from_slice(&self.tx_hashes);
        merkle_root(&hashes)
    }

    fn header(&self, merkle_root: &Hash256, time: u32, nonce: u32) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        write_header(
            &mut buf,
            self.version,
            &self.prev_block,
            merkle_root,
            time,
            self.bits,
            nonce,
        );
        buf
    }

    fn commit(&self, proof: &BlockProof) -> Result<Block> {
        if !self.target.is_met_by(&proof.hash) {
            return Err(Error::verification("high-hash"));
        }

        let root = self.merkle_root(proof.nonce1, proof.nonce2);
        let mut transactions = Vec::with_capacity(self.transactions.len() + 1);
        transactions.push(self.coinbase(proof.nonce1, proof.nonce2));
        transactions.extend(self.transactions.iter().cloned());

        Ok(Block {
            header: crate::consensus::BlockHeader {
                version: self.version,
                prev_block: self.prev_block,
                merkle_root: root,
                time: proof.time,
                bits: self.bits,
                nonce: proof.nonce,
            },
            transactions,
        })
    }
}

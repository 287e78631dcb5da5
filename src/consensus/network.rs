//! Network parameters
//!
//! Proof-of-work limit, halving interval, known deployment bits and genesis
//! header for each supported network.

use super::compact::CompactBits;
use super::header::BlockHeader;
use super::reward::RewardSchedule;
use super::version::VERSION_TOP_MASK;
use crate::error::{Error, Result};
use crate::Hash256;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display-order merkle root shared by all genesis blocks
const GENESIS_MERKLE_ROOT: &str =
    "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

/// Supported networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    /// Production network
    Main,
    /// Public test network
    Testnet,
    /// Local regression-test network with a trivial proof-of-work limit
    Regtest,
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkKind::Main => write!(f, "main"),
            NetworkKind::Testnet => write!(f, "testnet"),
            NetworkKind::Regtest => write!(f, "regtest"),
        }
    }
}

impl FromStr for NetworkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Ok(NetworkKind::Main),
            "testnet" | "test" => Ok(NetworkKind::Testnet),
            "regtest" => Ok(NetworkKind::Regtest),
            other => Err(Error::config(format!("Unknown network: {}", other))),
        }
    }
}

/// Consensus parameters of a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    /// Which network these parameters describe
    pub kind: NetworkKind,
    /// Easiest allowed target
    pub pow_limit: CompactBits,
    /// Blocks between subsidy halvings
    pub halving_interval: u32,
    /// Version bits claimed by known deployments
    pub known_bits: u32,
    /// Genesis block header
    pub genesis: BlockHeader,
}

impl Network {
    /// Parameters for `kind`
    pub fn new(kind: NetworkKind) -> Self {
        let merkle_root = Hash256::from_rhex(GENESIS_MERKLE_ROOT).unwrap_or_default();
        // csv, segwit and testdummy
        let known_bits = (1 << 0) | (1 << 1) | (1 << 28);

        let (pow_limit, halving_interval, time, nonce) = match kind {
            NetworkKind::Main => (CompactBits(0x1d00_ffff), 210_000, 1_231_006_505, 2_083_236_893),
            NetworkKind::Testnet => (CompactBits(0x1d00_ffff), 210_000, 1_296_688_602, 414_098_458),
            NetworkKind::Regtest => (CompactBits(0x207f_ffff), 150, 1_296_688_602, 2),
        };

        Self {
            kind,
            pow_limit,
            halving_interval,
            known_bits,
            genesis: BlockHeader {
                version: 1,
                prev_block: Hash256::ZERO,
                merkle_root,
                time,
                bits: pow_limit,
                nonce,
            },
        }
    }

    /// Mainnet parameters
    pub fn main() -> Self {
        Self::new(NetworkKind::Main)
    }

    /// Regtest parameters
    pub fn regtest() -> Self {
        Self::new(NetworkKind::Regtest)
    }

    /// Version bits not claimed by any known deployment
    pub fn unknown_bits(&self) -> u32 {
        !VERSION_TOP_MASK & !self.known_bits
    }

    /// Reward schedule for this network
    pub fn reward_schedule(&self) -> Result<RewardSchedule> {
        RewardSchedule::new(self.halving_interval)
    }

    /// Hash of the genesis header
    pub fn genesis_hash(&self) -> Hash256 {
        self.genesis.hash()
    }
}

//! Engine notifications

use super::{Block, MiningJob};
use crate::chain::ChainEntry;
use crate::consensus::CompactBits;
use crate::error::Error;
use crate::{Hash256, HashRate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Progress report for the active job
#[derive(Debug, Clone, Serialize)]
pub struct MiningStatus {
    /// Job the report belongs to
    pub job_id: Uuid,
    /// Hashes computed so far
    pub hashes: u128,
    /// Hash rate since the job started
    pub hash_rate: HashRate,
    /// Target bits of the job
    pub bits: CompactBits,
    /// Height being mined
    pub height: u32,
    /// Parent being extended
    pub tip: Hash256,
    /// When the report was taken
    pub timestamp: DateTime<Utc>,
}

impl MiningStatus {
    /// Snapshot a job after the current space has reached `nonce`
    pub fn new(job: &MiningJob, nonce: u32) -> Self {
        Self {
            job_id: job.id(),
            hashes: job.hashes(nonce),
            hash_rate: job.rate(nonce),
            bits: job.bits(),
            height: job.height(),
            tip: job.prev_block(),
            timestamp: Utc::now(),
        }
    }
}

/// Event published by the mining engine
#[derive(Debug, Clone)]
pub enum MinerEvent {
    /// Periodic progress report
    Status(MiningStatus),
    /// A mined block was accepted
    Block {
        /// The block
        block: Arc<Block>,
        /// Its chain entry
        entry: ChainEntry,
    },
    /// The run loop stopped on an error
    Error(Arc<Error>),
}

//! Mining jobs
//!
//! A job wraps one block template with its extra-nonce state and two one-way
//! latches: `destroyed` (set by whoever cancels the job) and `committed`
//! (set when a solution is turned into a block). Each latch flips false to
//! true at most once; a second flip is a state error.

use super::{Block, BlockTemplate};
use crate::consensus::{CompactBits, Target, HEADER_SIZE};
use crate::error::{Error, Result};
use crate::{Hash256, HashRate};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Extra-nonce pair stored in the coinbase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtraNonce {
    /// High word, bumped when `nonce2` wraps
    pub nonce1: u32,
    /// Low word, bumped once per exhausted nonce space
    pub nonce2: u32,
}

impl ExtraNonce {
    /// Move to the next pair
    pub fn advance(&mut self) {
        match self.nonce2.checked_add(1) {
            Some(next) => self.nonce2 = next,
            None => {
                self.nonce2 = 0;
                self.nonce1 = self.nonce1.wrapping_add(1);
            }
        }
    }

    /// Number of full nonce spaces already searched
    pub fn spaces(&self) -> u64 {
        (u64::from(self.nonce1) << 32) | u64::from(self.nonce2)
    }
}

/// One unit of mining work
#[derive(Debug)]
pub struct MiningJob {
    id: Uuid,
    template: Box<dyn BlockTemplate>,
    extra_nonce: Mutex<ExtraNonce>,
    start: Mutex<Instant>,
    destroyed: AtomicBool,
    committed: AtomicBool,
}

impl MiningJob {
    /// Wrap a template
    pub fn new(template: Box<dyn BlockTemplate>) -> Self {
        Self {
            id: Uuid::new_v4(),
            template,
            extra_nonce: Mutex::new(ExtraNonce::default()),
            start: Mutex::new(Instant::now()),
            destroyed: AtomicBool::new(false),
            committed: AtomicBool::new(false),
        }
    }

    /// Job identifier used in logs
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The wrapped template
    pub fn template(&self) -> &dyn BlockTemplate {
        self.template.as_ref()
    }

    /// Target of the template
    pub fn target(&self) -> &Target {
        self.template.target()
    }

    /// Compact bits of the template
    pub fn bits(&self) -> CompactBits {
        self.template.bits()
    }

    /// Height of the block being mined
    pub fn height(&self) -> u32 {
        self.template.height()
    }

    /// Parent of the block being mined
    pub fn prev_block(&self) -> Hash256 {
        self.template.prev_block()
    }

    /// Current extra-nonce pair
    pub fn extra_nonce(&self) -> ExtraNonce {
        *self.extra_nonce.lock()
    }

    /// Header for the current extra-nonce pair with a zero nonce
    pub fn header(&self) -> [u8; HEADER_SIZE] {
        let ExtraNonce { nonce1, nonce2 } = self.extra_nonce();
        let root = self.template.merkle_root(nonce1, nonce2);
        self.template.header(&root, self.template.time(), 0)
    }

    /// Advance the extra-nonce pair after the nonce space is exhausted
    pub fn update_nonce(&self) {
        self.extra_nonce.lock().advance();
    }

    /// Turn a solved nonce into a block
    pub fn commit(&self, nonce: u32) -> Result<Block> {
        if self
            .committed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::state(format!("Job {} already committed", self.id)));
        }

        let ExtraNonce { nonce1, nonce2 } = self.extra_nonce();
        let proof = self
            .template
            .proof(nonce1, nonce2, self.template.time(), nonce);
        self.template.commit(&proof)
    }

    /// Cancel the job
    pub fn destroy(&self) -> Result<()> {
        self.destroyed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| Error::state(format!("Job {} already destroyed", self.id)))
    }

    /// Whether the job has been cancelled
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Whether a solution has been committed
    pub fn is_committed(&self) -> bool {
        self.committed.load(Ordering::Acquire)
    }

    /// Restart the clock used for hash-rate and staleness
    pub fn reset_start(&self) {
        *self.start.lock() = Instant::now();
    }

    /// Time since the job (re)started
    pub fn elapsed(&self) -> Duration {
        self.start.lock().elapsed()
    }

    /// Hashes computed so far when the current space has reached `nonce`
    pub fn hashes(&self, nonce: u32) -> u128 {
        u128::from(self.extra_nonce().spaces()) * u128::from(u32::MAX) + u128::from(nonce)
    }

    /// Hash rate when the current space has reached `nonce`
    pub fn rate(&self, nonce: u32) -> HashRate {
        HashRate::from_hashes(self.hashes(nonce), self.elapsed().as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainEntry;
    use crate::consensus::Network;
    use crate::miner::SimpleTemplate;
    use crate::search::search;
    use assert_matches::assert_matches;

    fn job() -> MiningJob {
        let network = Network::regtest();
        let genesis = ChainEntry::from_header(&network.genesis, None).unwrap();
        let template = SimpleTemplate::new(
            &genesis,
            0x2000_0000,
            genesis.time() + 1,
            network.pow_limit,
            5_000_000_000,
            None,
            vec![],
        )
        .unwrap();
        MiningJob::new(Box::new(template))
    }

    #[test]
    fn test_extra_nonce_wraps() {
        let mut extra = ExtraNonce {
            nonce1: 0,
            nonce2: u32::MAX,
        };
        extra.advance();
        assert_eq!(extra, ExtraNonce { nonce1: 1, nonce2: 0 });
        extra.advance();
        assert_eq!(extra, ExtraNonce { nonce1: 1, nonce2: 1 });
    }

    #[test]
    fn test_header_tracks_extra_nonce() {
        let job = job();
        let first = job.header();
        assert_eq!(&first[76..80], &[0, 0, 0, 0]);
        job.update_nonce();
        assert_ne!(job.header(), first);
        assert_eq!(job.extra_nonce().nonce2, 1);
    }

    #[test]
    fn test_destroy_is_one_way() {
        let job = job();
        assert!(!job.is_destroyed());
        job.destroy().unwrap();
        assert!(job.is_destroyed());
        assert_matches!(job.destroy(), Err(Error::State { .. }));
    }

    #[test]
    fn test_commit_once() {
        let job = job();
        let mut header = job.header();
        let nonce = search(&mut header, job.target(), 0, 1_000).unwrap();

        let block = job.commit(nonce).unwrap();
        assert!(block.header.verify_pow());
        assert_eq!(block.header.nonce, nonce);
        assert!(job.is_committed());
        assert_matches!(job.commit(nonce), Err(Error::State { .. }));
    }

    #[test]
    fn test_hash_accounting() {
        let job = job();
        assert_eq!(job.hashes(100), 100);
        job.update_nonce();
        assert_eq!(job.hashes(0), u128::from(u32::MAX));
        assert_eq!(job.hashes(5), u128::from(u32::MAX) + 5);
        // elapsed is under a second, so the rate equals the hash count
        assert_eq!(job.rate(5).value(), (u128::from(u32::MAX) + 5) as f64);
    }
}

//! In-memory chain
//!
//! Keeps a single best chain on the network's proof-of-work limit. Blocks are
//! checked for the expected bits, proof of work and merkle root; a block
//! whose parent is not the current tip is reported as a race rather than
//! stored as a fork.

use super::{ChainEntry, ChainEvent};
use crate::consensus::{verify_pow, Network, RewardSchedule, VERSION_TOP_BITS};
use crate::crypto::sha256d;
use crate::error::{Error, Result};
use crate::miner::{Block, BlockTemplate, ChainAcceptor, SimpleTemplate, TemplateBuilder};
use crate::utils::current_timestamp_secs;
use crate::{Address, Hash256};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 1024;

/// Single-chain block store
pub struct MemoryChain {
    network: Network,
    schedule: RewardSchedule,
    entries: DashMap<Hash256, ChainEntry>,
    heights: DashMap<u32, Hash256>,
    mempool: DashMap<Hash256, Vec<u8>>,
    tip: Mutex<ChainEntry>,
    events: broadcast::Sender<ChainEvent>,
}

impl MemoryChain {
    /// Create a chain holding only the network's genesis block
    pub fn new(network: Network) -> Result<Self> {
        let schedule = network.reward_schedule()?;
        let genesis = ChainEntry::from_header(&network.genesis, None)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let entries = DashMap::new();
        let heights = DashMap::new();
        entries.insert(genesis.hash(), genesis.clone());
        heights.insert(0, genesis.hash());

        Ok(Self {
            network,
            schedule,
            entries,
            heights,
            mempool: DashMap::new(),
            tip: Mutex::new(genesis),
            events,
        })
    }

    /// Network parameters
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Subscribe to tip and mempool notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    /// Current best tip
    pub fn tip(&self) -> ChainEntry {
        self.tip.lock().clone()
    }

    /// Height of the best tip
    pub fn height(&self) -> u32 {
        self.tip.lock().height()
    }

    /// Look up an entry by hash
    pub fn entry(&self, hash: &Hash256) -> Option<ChainEntry> {
        self.entries.get(hash).map(|e| e.value().clone())
    }

    /// Look up the best-chain entry at `height`
    pub fn entry_at(&self, height: u32) -> Option<ChainEntry> {
        let hash = *self.heights.get(&height)?;
        self.entry(&hash)
    }

    /// Add a raw transaction to the mempool
    pub fn add_transaction(&self, raw: Vec<u8>) -> Hash256 {
        let hash = sha256d(&raw);
        if self.mempool.insert(hash, raw).is_none() {
            debug!("Added transaction {} to mempool", hash);
            let _ = self.events.send(ChainEvent::Transaction(hash));
        }
        hash
    }

    /// Number of transactions waiting in the mempool
    pub fn mempool_size(&self) -> usize {
        self.mempool.len()
    }

    fn mempool_snapshot(&self) -> Vec<Vec<u8>> {
        let mut txs: Vec<(Hash256, Vec<u8>)> = self
            .mempool
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        txs.sort_by(|a, b| a.0.cmp(&b.0));
        txs.into_iter().map(|(_, tx)| tx).collect()
    }

    fn check_block(&self, block: &Block, hash: &Hash256) -> Result<()> {
        if self.entries.contains_key(hash) {
            return Err(Error::verification("duplicate"));
        }

        if block.header.bits != self.network.pow_limit {
            return Err(Error::verification("bad-diffbits"));
        }

        if !verify_pow(hash, block.header.bits) {
            return Err(Error::verification("high-hash"));
        }

        if block.transactions.is_empty() {
            return Err(Error::verification("bad-cb-missing"));
        }

        if block.compute_merkle_root() != block.header.merkle_root {
            return Err(Error::verification("bad-txnmrklroot"));
        }

        Ok(())
    }
}

#[async_trait]
impl TemplateBuilder for MemoryChain {
    async fn build(
        &self,
        tip: Option<&ChainEntry>,
        address: Option<&Address>,
    ) -> Result<Box<dyn BlockTemplate>> {
        let prev = match tip {
            Some(tip) => self
                .entry(&tip.hash())
                .ok_or_else(|| Error::template(format!("Unknown tip {}", tip.hash())))?,
            None => self.tip(),
        };

        let now = u32::try_from(current_timestamp_secs()).unwrap_or(u32::MAX);
        let time = now.max(prev.time().saturating_add(1));
        let height = prev.height().saturating_add(1);

        let template = SimpleTemplate::new(
            &prev,
            VERSION_TOP_BITS,
            time,
            self.network.pow_limit,
            self.schedule.reward(height),
            address.cloned(),
            self.mempool_snapshot(),
        )?;

        Ok(Box::new(template))
    }
}

#[async_trait]
impl ChainAcceptor for MemoryChain {
    async fn submit(&self, block: &Block) -> Result<Option<ChainEntry>> {
        let hash = block.hash();
        self.check_block(block, &hash)?;

        let entry = {
            let mut tip = self.tip.lock();
            if block.header.prev_block != tip.hash() {
                debug!(
                    "Block {} extends {}, tip is {}",
                    hash, block.header.prev_block, tip.hash()
                );
                return Ok(None);
            }

            let entry = ChainEntry::from_block(block, Some(&*tip))?;
            self.entries.insert(entry.hash(), entry.clone());
            self.heights.insert(entry.height(), entry.hash());
            *tip = entry.clone();
            entry
        };

        for tx in block.transactions.iter().skip(1) {
            self.mempool.remove(&sha256d(tx));
        }

        info!("Block {} added at height {}", entry.hash(), entry.height());
        let _ = self.events.send(ChainEvent::Tip(entry.clone()));
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::BlockHeader;
    use crate::search::search;
    use assert_matches::assert_matches;

    async fn mine_with(chain: &MemoryChain, tip: Option<&ChainEntry>, nonce2: u32) -> Block {
        let template = chain.build(tip, None).await.unwrap();
        let root = template.merkle_root(0, nonce2);
        let mut header = template.header(&root, template.time(), 0);
        let nonce = search(&mut header, template.target(), 0, u32::MAX).unwrap();
        let proof = template.proof(0, nonce2, template.time(), nonce);
        template.commit(&proof).unwrap()
    }

    async fn mine_on(chain: &MemoryChain, tip: Option<&ChainEntry>) -> Block {
        mine_with(chain, tip, 0).await
    }

    #[tokio::test]
    async fn test_genesis_tip() {
        let chain = MemoryChain::new(Network::regtest()).unwrap();
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.tip().hash(), Network::regtest().genesis_hash());
        assert_eq!(chain.entry_at(0).unwrap(), chain.tip());
    }

    #[tokio::test]
    async fn test_submit_extends_tip() {
        let chain = MemoryChain::new(Network::regtest()).unwrap();
        let mut events = chain.subscribe();
        let genesis = chain.tip();

        let block = mine_on(&chain, None).await;
        let entry = chain.submit(&block).await.unwrap().unwrap();

        assert_eq!(entry.height(), 1);
        assert_eq!(entry.chainwork(), &(genesis.chainwork() + entry.proof()));
        assert_eq!(chain.tip(), entry);
        assert_matches!(events.recv().await.unwrap(), ChainEvent::Tip(e) if e == entry);
    }

    #[tokio::test]
    async fn test_stale_parent_is_a_race() {
        let chain = MemoryChain::new(Network::regtest()).unwrap();
        let genesis = chain.tip();

        let first = mine_with(&chain, Some(&genesis), 0).await;
        let second = mine_with(&chain, Some(&genesis), 1).await;
        assert_ne!(first.hash(), second.hash());

        assert!(chain.submit(&first).await.unwrap().is_some());
        assert!(chain.submit(&second).await.unwrap().is_none());
        assert_eq!(chain.height(), 1);
    }

    #[tokio::test]
    async fn test_rejections() {
        let chain = MemoryChain::new(Network::regtest()).unwrap();
        let block = mine_on(&chain, None).await;

        let mut bad_root = block.clone();
        bad_root.transactions.push(b"extra".to_vec());
        assert_matches!(
            chain.submit(&bad_root).await,
            Err(Error::Verification { reason }) if reason == "bad-txnmrklroot"
        );

        let mut bad_bits = block.clone();
        bad_bits.header.bits = crate::consensus::CompactBits(0x1d00_ffff);
        assert_matches!(chain.submit(&bad_bits).await, Err(Error::Verification { .. }));

        chain.submit(&block).await.unwrap().unwrap();
        assert_matches!(
            chain.submit(&block).await,
            Err(Error::Verification { reason }) if reason == "duplicate"
        );
    }

    #[tokio::test]
    async fn test_mempool_flow() {
        let chain = MemoryChain::new(Network::regtest()).unwrap();
        let mut events = chain.subscribe();

        let hash = chain.add_transaction(b"payment".to_vec());
        assert_matches!(events.recv().await.unwrap(), ChainEvent::Transaction(h) if h == hash);
        assert_eq!(chain.mempool_size(), 1);

        let block = mine_on(&chain, None).await;
        assert_eq!(block.transactions.len(), 2);
        chain.submit(&block).await.unwrap().unwrap();
        assert_eq!(chain.mempool_size(), 0);
    }

    #[tokio::test]
    async fn test_unknown_tip() {
        let chain = MemoryChain::new(Network::regtest()).unwrap();
        let header = BlockHeader {
            prev_block: Hash256([0xab; 32]),
            ..chain.network().genesis.clone()
        };
        let stranger = ChainEntry::from_header(&header, None).unwrap();
        assert_matches!(chain.build(Some(&stranger), None).await, Err(Error::Template { .. }));
    }

    #[tokio::test]
    async fn test_reward_in_coinbase() {
        let chain = MemoryChain::new(Network::regtest()).unwrap();
        let block = mine_on(&chain, None).await;
        let coinbase = block.coinbase().unwrap();
        let reward = u64::from_le_bytes(coinbase[12..20].try_into().unwrap());
        assert_eq!(reward, crate::consensus::BASE_REWARD);
    }
}

//! Integration tests for the complete mining flow

use async_trait::async_trait;
use pow_miner::chain::MemoryChain;
use pow_miner::consensus::{Network, Target, HEADER_SIZE};
use pow_miner::miner::{ChainAcceptor, EngineState, MinerEvent, MinerOptions, MiningEngine};
use pow_miner::worker::{NonceSearcher, WorkerFactory};
use pow_miner::{Address, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(30);

/// Never finds anything, yielding between windows
struct BarrenSearcher;

#[async_trait]
impl NonceSearcher for BarrenSearcher {
    fn worker_type(&self) -> &'static str {
        "barren"
    }

    async fn search(
        &self,
        _header: [u8; HEADER_SIZE],
        _target: Target,
        _min: u32,
        _max: u32,
    ) -> Result<Option<u32>> {
        tokio::time::sleep(Duration::from_millis(1)).await;
        Ok(None)
    }
}

fn engine_on(
    chain: &Arc<MemoryChain>,
    searcher: Arc<dyn NonceSearcher>,
    options: MinerOptions,
) -> MiningEngine {
    MiningEngine::new(chain.clone(), chain.clone(), searcher, options)
}

async fn next_block(events: &mut broadcast::Receiver<MinerEvent>) -> MinerEvent {
    loop {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for a block")
            .expect("event stream closed");
        if matches!(event, MinerEvent::Block { .. }) {
            return event;
        }
    }
}

async fn mine_blocks(searcher: Arc<dyn NonceSearcher>, count: u32) {
    let chain = Arc::new(MemoryChain::new(Network::regtest()).unwrap());
    let options = MinerOptions {
        address: Some(Address::new("integration-miner").unwrap()),
        ..MinerOptions::default()
    };
    let engine = engine_on(&chain, searcher, options);
    let mut events = engine.subscribe();
    let notifier = engine.attach(chain.subscribe());

    engine.start().await.unwrap();

    for height in 1..=count {
        match next_block(&mut events).await {
            MinerEvent::Block { block, entry } => {
                assert_eq!(entry.height(), height);
                assert_eq!(entry.hash(), block.hash());
                assert!(block.header.verify_pow());
                let coinbase = block.coinbase().unwrap();
                assert!(coinbase.ends_with(b"integration-miner"));
            }
            _ => unreachable!(),
        }
    }

    engine.stop().await;
    notifier.abort();

    assert_eq!(engine.state(), EngineState::Idle);
    assert!(engine.current_job().is_none());
    assert!(chain.height() >= count);

    // Every stored block links to its predecessor.
    for height in 1..=chain.height() {
        let entry = chain.entry_at(height).unwrap();
        let parent = chain.entry_at(height - 1).unwrap();
        assert_eq!(entry.prev_block(), parent.hash());
        assert!(entry.has_more_work_than(&parent));
    }
}

#[tokio::test]
async fn test_local_worker_mines_chain() {
    mine_blocks(WorkerFactory::create_local_worker(), 3).await;
}

#[tokio::test]
async fn test_cpu_worker_mines_chain() {
    mine_blocks(WorkerFactory::create_cpu_worker(2).unwrap(), 3).await;
}

#[tokio::test]
async fn test_start_stop_lifecycle() {
    let chain = Arc::new(MemoryChain::new(Network::regtest()).unwrap());
    let engine = engine_on(&chain, Arc::new(BarrenSearcher), MinerOptions::default());

    // Stopping an idle engine is a no-op.
    engine.stop().await;
    assert_eq!(engine.state(), EngineState::Idle);

    engine.start().await.unwrap();
    assert!(engine.is_running());
    assert!(engine.start().await.is_err());

    engine.stop().await;
    assert_eq!(engine.state(), EngineState::Idle);

    // And it can be restarted.
    engine.start().await.unwrap();
    engine.stop().await;
    assert_eq!(engine.state(), EngineState::Idle);
}

#[tokio::test]
async fn test_new_tip_replaces_job() {
    let chain = Arc::new(MemoryChain::new(Network::regtest()).unwrap());
    let engine = engine_on(&chain, Arc::new(BarrenSearcher), MinerOptions::default());
    let notifier = engine.attach(chain.subscribe());

    engine.start().await.unwrap();

    let first = timeout(WAIT, async {
        loop {
            if let Some(job) = engine.current_job() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(first.prev_block(), Network::regtest().genesis_hash());

    // A competing miner extends the chain.
    let rival = engine_on(&chain, WorkerFactory::create_local_worker(), MinerOptions::default());
    let block = rival.mine_once(None, None).await.unwrap().unwrap();
    let entry = chain.submit(&block).await.unwrap().unwrap();

    let second = timeout(WAIT, async {
        loop {
            match engine.current_job() {
                Some(job) if job.prev_block() == entry.hash() => return job,
                _ => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }
    })
    .await
    .unwrap();

    assert!(first.is_destroyed());
    assert!(!first.is_committed());
    assert_eq!(second.height(), 2);

    engine.stop().await;
    notifier.abort();
}

#[tokio::test]
async fn test_mempool_change_replaces_stale_job() {
    let chain = Arc::new(MemoryChain::new(Network::regtest()).unwrap());
    let options = MinerOptions {
        job_staleness: Duration::from_millis(50),
        ..MinerOptions::default()
    };
    let engine = engine_on(&chain, Arc::new(BarrenSearcher), options);
    let notifier = engine.attach(chain.subscribe());

    engine.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let first = engine.current_job().unwrap();

    // Fresh job: the transaction is not enough to replace it.
    chain.add_transaction(b"early".to_vec());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!first.is_destroyed());

    tokio::time::sleep(Duration::from_millis(100)).await;
    chain.add_transaction(b"late".to_vec());

    timeout(WAIT, async {
        while !first.is_destroyed() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    engine.stop().await;
    notifier.abort();
}

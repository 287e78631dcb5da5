//! Mining engine
//!
//! Drives the build-search-submit loop. The engine moves through
//! `Idle -> Running -> Stopping -> Idle`; at most one run loop exists at a
//! time and at most one job is active. The nonce space of a job is searched
//! in windows of [`INTERVAL`] nonces, and cancellation (stop, tip change,
//! stale job) is observed between windows.

use super::events::{MinerEvent, MiningStatus};
use super::job::MiningJob;
use super::{Block, ChainAcceptor, TemplateBuilder};
use crate::chain::{ChainEntry, ChainEvent};
use crate::error::{Error, Result};
use crate::search;
use crate::worker::NonceSearcher;
use crate::Address;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Width of one search window
pub const INTERVAL: u32 = 0xffff_ffff / 1500;

/// Lifecycle of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No run loop
    Idle,
    /// Run loop active
    Running,
    /// Stop requested, waiting for the run loop to exit
    Stopping,
}

/// Engine options
#[derive(Debug, Clone)]
pub struct MinerOptions {
    /// Reward address passed to the template builder
    pub address: Option<Address>,
    /// Age after which a mempool change replaces the active job
    pub job_staleness: Duration,
    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl Default for MinerOptions {
    fn default() -> Self {
        Self {
            address: None,
            job_staleness: Duration::from_secs(10),
            event_capacity: 256,
        }
    }
}

enum SearchOutcome {
    Found(u32),
    Exhausted,
    Cancelled,
}

struct Inner {
    builder: Arc<dyn TemplateBuilder>,
    chain: Arc<dyn ChainAcceptor>,
    searcher: Arc<dyn NonceSearcher>,
    options: MinerOptions,
    state: Mutex<EngineState>,
    gate: tokio::sync::Mutex<()>,
    job: Mutex<Option<Arc<MiningJob>>>,
    cancel: Mutex<CancellationToken>,
    exit: Mutex<Option<oneshot::Receiver<()>>>,
    events: broadcast::Sender<MinerEvent>,
}

/// CPU mining engine
#[derive(Clone)]
pub struct MiningEngine {
    inner: Arc<Inner>,
}

impl MiningEngine {
    /// Create an idle engine
    pub fn new(
        builder: Arc<dyn TemplateBuilder>,
        chain: Arc<dyn ChainAcceptor>,
        searcher: Arc<dyn NonceSearcher>,
        options: MinerOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                builder,
                chain,
                searcher,
                options,
                state: Mutex::new(EngineState::Idle),
                gate: tokio::sync::Mutex::new(()),
                job: Mutex::new(None),
                cancel: Mutex::new(CancellationToken::new()),
                exit: Mutex::new(None),
                events,
            }),
        }
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<MinerEvent> {
        self.inner.events.subscribe()
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        *self.inner.state.lock()
    }

    /// Whether the run loop is active and not stopping
    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    /// The job currently being mined by the run loop
    pub fn current_job(&self) -> Option<Arc<MiningJob>> {
        self.inner.job.lock().clone()
    }

    /// Start the run loop
    pub async fn start(&self) -> Result<()> {
        let _gate = self.inner.gate.lock().await;

        {
            let mut state = self.inner.state.lock();
            if *state != EngineState::Idle {
                return Err(Error::state("Miner is already running"));
            }
            *state = EngineState::Running;
        }

        let token = CancellationToken::new();
        *self.inner.cancel.lock() = token.clone();

        let (done_tx, done_rx) = oneshot::channel();
        *self.inner.exit.lock() = Some(done_rx);

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run(token).await;
            engine.finish();
            let _ = done_tx.send(());
        });

        info!(
            "Miner started (worker: {})",
            self.inner.searcher.worker_type()
        );
        Ok(())
    }

    /// Stop the run loop and wait for it to exit
    ///
    /// Does nothing when the engine is not running.
    pub async fn stop(&self) {
        let _gate = self.inner.gate.lock().await;

        {
            let mut state = self.inner.state.lock();
            if *state != EngineState::Running {
                return;
            }
            *state = EngineState::Stopping;
        }

        self.inner.cancel.lock().cancel();

        let job = self.inner.job.lock().take();
        if let Some(job) = job {
            destroy_job(&job, "stop");
        }

        let exit = self.inner.exit.lock().take();
        if let Some(exit) = exit {
            // A dropped sender means the loop is gone as well.
            let _ = exit.await;
        }

        *self.inner.state.lock() = EngineState::Idle;
        info!("Miner stopped");
    }

    /// Build a job on `tip` (or the best tip) paying `address`
    pub async fn create_job(
        &self,
        tip: Option<&ChainEntry>,
        address: Option<&Address>,
    ) -> Result<Arc<MiningJob>> {
        let template = self.inner.builder.build(tip, address).await?;
        let job = Arc::new(MiningJob::new(template));
        debug!(
            job = %job.id(),
            height = job.height(),
            "Created mining job on {}",
            job.prev_block()
        );
        Ok(job)
    }

    /// Build and mine a single block without touching the run loop
    pub async fn mine_once(
        &self,
        tip: Option<&ChainEntry>,
        address: Option<&Address>,
    ) -> Result<Option<Block>> {
        let job = self.create_job(tip, address).await?;
        self.mine_job(&job).await
    }

    /// Search a job's nonce space until it is solved or destroyed
    ///
    /// Returns `Ok(None)` when the job was destroyed before a solution was
    /// committed.
    pub async fn mine_job(&self, job: &MiningJob) -> Result<Option<Block>> {
        job.reset_start();

        loop {
            match self.find_nonce(job).await? {
                SearchOutcome::Found(nonce) => return job.commit(nonce).map(Some),
                SearchOutcome::Cancelled => return Ok(None),
                SearchOutcome::Exhausted => {}
            }

            job.update_nonce();
            self.send_status(job, 0);
        }
    }

    /// Mine a job on the calling thread with the local search primitive
    ///
    /// No delegation and no cancellation: this only returns once a block is
    /// found.
    pub fn mine_blocking(&self, job: &MiningJob) -> Result<Block> {
        job.reset_start();
        let target = job.target().to_le_bytes();

        loop {
            let mut header = job.header();
            for (min, max) in nonce_windows() {
                if let Some(nonce) = search::search_bytes(&mut header, &target, min, max) {
                    return job.commit(nonce);
                }
                self.send_status(job, max);
            }

            job.update_nonce();
            self.send_status(job, 0);
        }
    }

    /// Handle a new chain tip
    ///
    /// The active job is destroyed when its parent is no longer the tip.
    /// Announcements below the job's parent arrive late and are ignored.
    pub fn notify_tip(&self, tip: &ChainEntry) {
        let stale = {
            let mut slot = self.inner.job.lock();
            let superseded = slot.as_ref().is_some_and(|job| {
                job.prev_block() != tip.hash() && tip.height().saturating_add(1) >= job.height()
            });
            if superseded {
                slot.take()
            } else {
                None
            }
        };

        if let Some(job) = stale {
            debug!(job = %job.id(), "New tip {} at height {}", tip.hash(), tip.height());
            destroy_job(&job, "tip change");
        }
    }

    /// Handle a mempool change
    ///
    /// The active job is destroyed when it is older than the staleness
    /// threshold, so that the next template picks up new transactions.
    pub fn notify_entry(&self) {
        if !self.is_running() {
            return;
        }

        let staleness = self.inner.options.job_staleness;
        let stale = {
            let mut slot = self.inner.job.lock();
            let expired = slot.as_ref().is_some_and(|job| job.elapsed() > staleness);
            if expired {
                slot.take()
            } else {
                None
            }
        };

        if let Some(job) = stale {
            destroy_job(&job, "mempool change");
        }
    }

    /// Forward chain notifications to [`notify_tip`](Self::notify_tip) and
    /// [`notify_entry`](Self::notify_entry)
    pub fn attach(&self, mut events: broadcast::Receiver<ChainEvent>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ChainEvent::Tip(entry)) => engine.notify_tip(&entry),
                    Ok(ChainEvent::Transaction(_)) => engine.notify_entry(),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Chain notifications lagged, skipped {}", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn run(&self, token: CancellationToken) {
        let address = self.inner.options.address.clone();

        loop {
            if token.is_cancelled() {
                break;
            }

            let job = match self.create_job(None, address.as_ref()).await {
                Ok(job) => job,
                Err(err) => {
                    if !token.is_cancelled() {
                        self.fail(err);
                    }
                    break;
                }
            };

            *self.inner.job.lock() = Some(Arc::clone(&job));

            if token.is_cancelled() {
                break;
            }

            let block = match self.mine_job(&job).await {
                Ok(Some(block)) => block,
                Ok(None) => continue,
                Err(err) => {
                    if !token.is_cancelled() {
                        self.fail(err);
                    }
                    break;
                }
            };

            self.release_job(&job);

            match self.inner.chain.submit(&block).await {
                Ok(Some(entry)) => {
                    info!(
                        "Found block: {} (height: {})",
                        entry.hash(), entry.height()
                    );
                    self.emit(MinerEvent::Block {
                        block: Arc::new(block),
                        entry,
                    });
                }
                Ok(None) => {
                    warn!("Mined a bad-prevblk (race condition?): {}", block.hash());
                }
                Err(err) if err.is_recoverable() => {
                    warn!("Mined an invalid block: {}", err);
                }
                Err(err) => {
                    if !token.is_cancelled() {
                        self.fail(err);
                    }
                    break;
                }
            }
        }
    }

    async fn find_nonce(&self, job: &MiningJob) -> Result<SearchOutcome> {
        let header = job.header();
        let target = job.target().clone();

        for (min, max) in nonce_windows() {
            let found = match self
                .inner
                .searcher
                .search(header, target.clone(), min, max)
                .await
            {
                Ok(found) => found,
                Err(err) if job.is_destroyed() => {
                    debug!(job = %job.id(), "Ignoring worker error on destroyed job: {}", err);
                    return Ok(SearchOutcome::Cancelled);
                }
                Err(err) => return Err(err),
            };

            if job.is_destroyed() {
                return Ok(SearchOutcome::Cancelled);
            }

            if let Some(nonce) = found {
                return Ok(SearchOutcome::Found(nonce));
            }

            self.send_status(job, max);
        }

        Ok(SearchOutcome::Exhausted)
    }

    fn send_status(&self, job: &MiningJob, nonce: u32) {
        let status = MiningStatus::new(job, nonce);
        info!(
            "Status: hashrate={:.0}khs hashes={} target={} height={} tip={}",
            status.hash_rate.khs(),
            status.hashes,
            status.bits.value(),
            status.height,
            status.tip
        );
        self.emit(MinerEvent::Status(status));
    }

    fn emit(&self, event: MinerEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn fail(&self, err: Error) {
        error!("Mining loop failed ({}): {}", err.category(), err);
        self.emit(MinerEvent::Error(Arc::new(err)));
    }

    fn release_job(&self, job: &Arc<MiningJob>) {
        let mut slot = self.inner.job.lock();
        if slot.as_ref().is_some_and(|active| Arc::ptr_eq(active, job)) {
            *slot = None;
        }
    }

    fn finish(&self) {
        self.inner.job.lock().take();
        let mut state = self.inner.state.lock();
        if *state == EngineState::Running {
            *state = EngineState::Idle;
        }
    }
}

/// Consecutive `[min, max]` nonce windows of `INTERVAL` covering `0..=u32::MAX`
fn nonce_windows() -> impl Iterator<Item = (u32, u32)> {
    std::iter::successors(Some((0u32, INTERVAL - 1)), |&(_, max)| {
        (max < u32::MAX).then(|| (max + 1, max.saturating_add(INTERVAL)))
    })
}

fn destroy_job(job: &MiningJob, reason: &str) {
    match job.destroy() {
        Ok(()) => debug!(job = %job.id(), "Destroyed job ({})", reason),
        Err(err) => warn!("{}", err),
    }
}

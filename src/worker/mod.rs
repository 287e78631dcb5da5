//! Nonce search workers
//!
//! The engine delegates each search window to a [`NonceSearcher`]. Workers
//! run the search off the async executor: on the blocking pool, on a rayon
//! pool, or in an external process.

use crate::config::WorkerType;
use crate::consensus::{Target, HEADER_SIZE};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::Span;

pub mod cpu;
pub mod external;
pub mod local;

pub use cpu::CpuSearcher;
pub use external::ExternalSearcher;
pub use local::LocalSearcher;

/// Searches a nonce range of a serialized header
///
/// Same contract as [`crate::search::search`]: the first nonce in
/// `min..=max` whose hash meets `target`, or `None`.
#[async_trait]
pub trait NonceSearcher: Send + Sync {
    /// Worker type name for logging
    fn worker_type(&self) -> &'static str;

    /// Search `min..=max`
    async fn search(
        &self,
        header: [u8; HEADER_SIZE],
        target: Target,
        min: u32,
        max: u32,
    ) -> Result<Option<u32>>;
}

/// Worker factory for creating the different searchers
pub struct WorkerFactory;

impl WorkerFactory {
    /// Create a searcher on the blocking pool
    pub fn create_local_worker() -> Arc<dyn NonceSearcher> {
        Arc::new(LocalSearcher::new())
    }

    /// Create a multi-threaded searcher (0 threads means one per core)
    pub fn create_cpu_worker(thread_count: usize) -> Result<Arc<dyn NonceSearcher>> {
        Ok(Arc::new(CpuSearcher::new(thread_count)?))
    }

    /// Create an external command searcher
    pub fn create_external_worker(command: String, timeout: Duration) -> Arc<dyn NonceSearcher> {
        Arc::new(ExternalSearcher::new(command, timeout))
    }

    /// Create the searcher selected by `worker_type`
    pub fn create(
        worker_type: WorkerType,
        thread_count: usize,
        command: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn NonceSearcher>> {
        match worker_type {
            WorkerType::Local => Ok(Self::create_local_worker()),
            WorkerType::Cpu => Self::create_cpu_worker(thread_count),
            WorkerType::External => Ok(Self::create_external_worker(command.to_string(), timeout)),
        }
    }
}

/// Create a tracing span for one search window
pub fn search_span(worker_type: &str, min: u32, max: u32) -> Span {
    tracing::debug_span!("search", worker_type = worker_type, min = min, max = max)
}

//! Multi-threaded CPU searcher
//!
//! Splits a window into contiguous chunks searched in parallel on a private
//! rayon pool. The lowest satisfying nonce wins, so the answer is the same
//! as a sequential scan of the window.

use super::{search_span, NonceSearcher};
use crate::consensus::{Target, HEADER_SIZE};
use crate::error::{Error, Result};
use crate::search;
use async_trait::async_trait;
use rayon::prelude::*;
use std::sync::Arc;
use tokio::task;
use tracing::info;

/// CPU searcher using multiple threads
pub struct CpuSearcher {
    thread_count: usize,
    pool: Arc<rayon::ThreadPool>,
}

impl CpuSearcher {
    /// Create a searcher with `thread_count` threads (0 means one per core)
    pub fn new(thread_count: usize) -> Result<Self> {
        let thread_count = if thread_count == 0 {
            num_cpus::get()
        } else {
            thread_count
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(|i| format!("pow-search-{}", i))
            .build()
            .map_err(|e| Error::worker("cpu", format!("Failed to build thread pool: {}", e)))?;

        info!("Creating CPU searcher with {} threads", thread_count);

        Ok(Self {
            thread_count,
            pool: Arc::new(pool),
        })
    }

    /// Number of search threads
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }
}

/// Split `min..=max` into at most `parts` contiguous inclusive ranges
pub fn split_range(min: u32, max: u32, parts: usize) -> Vec<(u32, u32)> {
    if min > max || parts == 0 {
        return Vec::new();
    }

    let len = u64::from(max) - u64::from(min) + 1;
    let parts = (parts as u64).min(len);
    let chunk = len.div_ceil(parts);

    let mut ranges = Vec::with_capacity(parts as usize);
    let mut start = u64::from(min);
    while start <= u64::from(max) {
        let end = (start + chunk - 1).min(u64::from(max));
        ranges.push((start as u32, end as u32));
        start = end + 1;
    }
    ranges
}

#[async_trait]
impl NonceSearcher for CpuSearcher {
    fn worker_type(&self) -> &'static str {
        "cpu"
    }

    async fn search(
        &self,
        header: [u8; HEADER_SIZE],
        target: Target,
        min: u32,
        max: u32,
    ) -> Result<Option<u32>> {
        let span = search_span(self.worker_type(), min, max);
        let pool = Arc::clone(&self.pool);
        let ranges = split_range(min, max, self.thread_count);

        task::spawn_blocking(move || {
            let _enter = span.enter();
            let target = target.to_le_bytes();
            pool.install(|| {
                ranges.par_iter().find_map_first(|&(lo, hi)| {
                    let mut header = header;
                    search::search_bytes(&mut header, &target, lo, hi)
                })
            })
        })
        .await
        .map_err(|e| Error::worker("cpu", format!("Search task failed: {}", e)))
    }
}

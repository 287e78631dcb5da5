//! Single-threaded searcher on tokio's blocking pool

use super::{search_span, NonceSearcher};
use crate::consensus::{Target, HEADER_SIZE};
use crate::error::{Error, Result};
use crate::search;
use async_trait::async_trait;
use tokio::task;

/// Runs the search primitive on a blocking thread
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSearcher;

impl LocalSearcher {
    /// Create a local searcher
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NonceSearcher for LocalSearcher {
    fn worker_type(&self) -> &'static str {
        "local"
    }

    async fn search(
        &self,
        header: [u8; HEADER_SIZE],
        target: Target,
        min: u32,
        max: u32,
    ) -> Result<Option<u32>> {
        let span = search_span(self.worker_type(), min, max);
        task::spawn_blocking(move || {
            let _enter = span.enter();
            let mut header = header;
            search::search(&mut header, &target, min, max)
        })
        .await
        .map_err(|e| Error::worker("local", format!("Search task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_target() {
        let searcher = LocalSearcher::new();
        let found = searcher
            .search([1u8; HEADER_SIZE], Target::zero(), 0, 1_000)
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_easy_target() {
        let searcher = LocalSearcher::new();
        let found = searcher
            .search([1u8; HEADER_SIZE], Target::max(), 42, 50)
            .await
            .unwrap();
        assert_eq!(found, Some(42));
    }
}

//! Chain records and the in-memory chain
//!
//! [`ChainEntry`] carries the chainwork ledger. [`MemoryChain`] is a minimal
//! best-chain store used by the binary and the tests: it builds templates,
//! accepts mined blocks and publishes [`ChainEvent`]s.

use crate::Hash256;

pub mod entry;
pub mod memory;

pub use entry::{ChainEntry, ChainEntryJson, ENTRY_SIZE};
pub use memory::MemoryChain;

/// Notification published by a chain
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// The best tip changed
    Tip(ChainEntry),
    /// A transaction entered the mempool
    Transaction(Hash256),
}

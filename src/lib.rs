//! Proof-of-work consensus and CPU mining
//!
//! - Compact difficulty targets, chainwork and the subsidy schedule
//! - 80-byte block headers and 116-byte chain entries
//! - An inclusive nonce search primitive
//! - An async mining engine that builds jobs, searches them window by window
//!   and hands solved blocks to a chain
//! - Local, multi-threaded and external search workers

#![forbid(unsafe_code)]

pub mod chain;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod miner;
pub mod search;
pub mod types;
pub mod utils;
pub mod worker;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

/// Application information
pub const APP_NAME: &str = "pow-miner";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

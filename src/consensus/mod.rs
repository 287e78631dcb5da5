//! Consensus arithmetic
//!
//! Everything in here must agree bit-for-bit with every other node on the
//! network: compact target encoding, proof-of-work verification, per-block
//! proof, the subsidy schedule, version-bits signalling and the header layout.

pub mod compact;
pub mod header;
pub mod network;
pub mod reward;
pub mod target;
pub mod version;

pub use compact::{verify_pow, CompactBits};
pub use header::{BlockHeader, HEADER_SIZE, NONCE_OFFSET};
pub use network::{Network, NetworkKind};
pub use reward::{reward, RewardSchedule, BASE_REWARD, COIN, HALF_REWARD, MAX_MONEY};
pub use target::{Target, MAX_CHAINWORK};
pub use version::{has_bit, has_unknown, VERSION_TOP_BITS, VERSION_TOP_MASK};

//! Block subsidy schedule
//!
//! The subsidy starts at 50 coins and halves every `interval` blocks. After 33
//! halvings a right shift would leave nothing, so the subsidy is zero.

use crate::error::{Error, Result};
use crate::Amount;

/// Base units per coin
pub const COIN: Amount = 100_000_000;

/// Subsidy before the first halving
pub const BASE_REWARD: Amount = 50 * COIN;

/// Subsidy after the first halving
pub const HALF_REWARD: Amount = BASE_REWARD / 2;

/// Upper bound on the money supply
pub const MAX_MONEY: Amount = 21_000_000 * COIN;

/// Number of halvings after which the subsidy is zero
pub const MAX_HALVINGS: u32 = 33;

/// Subsidy for a block at `height` with halving period `interval`
pub fn reward(height: u32, interval: u32) -> Result<Amount> {
    if interval == 0 {
        return Err(Error::config("Halving interval must be greater than 0"));
    }
    Ok(subsidy(height / interval))
}

fn subsidy(halvings: u32) -> Amount {
    if halvings >= MAX_HALVINGS {
        return 0;
    }

    if halvings == 0 {
        return BASE_REWARD;
    }

    HALF_REWARD >> (halvings - 1)
}

/// Reward schedule with a validated halving interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardSchedule {
    interval: u32,
}

impl RewardSchedule {
    /// Create a schedule, rejecting a zero interval
    pub fn new(interval: u32) -> Result<Self> {
        if interval == 0 {
            return Err(Error::config("Halving interval must be greater than 0"));
        }
        Ok(Self { interval })
    }

    /// The halving interval
    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Subsidy at `height`
    pub fn reward(&self, height: u32) -> Amount {
        subsidy(height / self.interval)
    }

    /// Total subsidy paid out for heights `0..=height`
    pub fn total_issued(&self, height: u32) -> Amount {
        let mut total: Amount = 0;
        let mut start: u64 = 0;
        let end = u64::from(height) + 1;
        let interval = u64::from(self.interval);
        let mut halvings = 0u32;

        while start < end && halvings < MAX_HALVINGS {
            let span = (end - start).min(interval);
            total += subsidy(halvings) * span;
            start += interval;
            halvings += 1;
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_constants() {
        assert_eq!(BASE_REWARD, 5_000_000_000);
        assert_eq!(HALF_REWARD, 2_500_000_000);
    }

    #[test]
    fn test_schedule_points() {
        let interval = 210_000;
        assert_eq!(reward(0, interval).unwrap(), BASE_REWARD);
        assert_eq!(reward(interval - 1, interval).unwrap(), BASE_REWARD);
        assert_eq!(reward(interval, interval).unwrap(), HALF_REWARD);
        assert_eq!(reward(2 * interval, interval).unwrap(), HALF_REWARD / 2);
        assert_eq!(reward(32 * interval, interval).unwrap(), HALF_REWARD >> 31);
        assert_eq!(reward(32 * interval, interval).unwrap(), 1);
        assert_eq!(reward(33 * interval, interval).unwrap(), 0);
        assert_eq!(reward(64 * interval, interval).unwrap(), 0);
        assert_eq!(reward(64 * interval + 1, interval).unwrap(), 0);
        assert_eq!(reward(u32::MAX, interval).unwrap(), 0);
    }

    #[test]
    fn test_zero_interval() {
        assert_matches!(reward(10, 0), Err(Error::Config { .. }));
        assert_matches!(RewardSchedule::new(0), Err(Error::Config { .. }));
    }

    #[test]
    fn test_schedule_matches_function() {
        let schedule = RewardSchedule::new(150).unwrap();
        for height in [0, 149, 150, 299, 300, 4950, 4999] {
            assert_eq!(schedule.reward(height), reward(height, 150).unwrap());
        }
    }

    #[test]
    fn test_total_issued_stays_under_cap() {
        let schedule = RewardSchedule::new(210_000).unwrap();
        assert_eq!(schedule.total_issued(0), BASE_REWARD);
        assert_eq!(schedule.total_issued(209_999), 210_000 * BASE_REWARD);
        let all = schedule.total_issued(u32::MAX);
        assert!(all <= MAX_MONEY);
        assert!(all > 20_999_999 * COIN);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn reward_never_increases(height in 0u32..u32::MAX, interval in 1u32..1_000_000) {
            let now = reward(height, interval).unwrap();
            let next = reward(height + 1, interval).unwrap();
            prop_assert!(next <= now);
            prop_assert!(now <= BASE_REWARD);
        }
    }
}

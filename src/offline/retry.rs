//! # Retry Backoff
//!
//! Delay calculation for queue items that failed to reach the remote store.
//!
//! ## Features
//!
//! - **Exponential Backoff**: `base * 2^(retry_count - 1)`, capped at a ceiling
//! - **Fixed Interval**: constant delay, mostly useful in tests
//!
//! ## Usage
//!
//! ```rust
//! use onboarding_sync::offline::retry::BackoffStrategy;
//! use std::time::Duration;
//!
//! let backoff = BackoffStrategy::default();
//! assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
//! assert_eq!(backoff.delay_for(3), Duration::from_secs(4));
//! assert_eq!(backoff.delay_for(10), Duration::from_secs(30));
//! ```

use std::time::Duration;

/// Base delay of the default exponential strategy
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Ceiling of the default exponential strategy
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Backoff strategy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Fixed interval between retries
    Fixed {
        interval: Duration,
    },
    /// Doubling delay per failed attempt
    Exponential {
        /// Delay after the first failure
        base: Duration,
        /// Upper bound for any single delay
        max: Duration,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: DEFAULT_BASE_DELAY,
            max: DEFAULT_MAX_DELAY,
        }
    }
}

impl BackoffStrategy {
    /// Delay before the next attempt of an item that has failed
    /// `retry_count` times. A count of zero is treated as one.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        match *self {
            Self::Fixed { interval } => interval,
            Self::Exponential { base, max } => {
                let exponent = retry_count.saturating_sub(1).min(31);
                base.checked_mul(1u32 << exponent)
                    .map_or(max, |delay| delay.min(max))
            }
        }
    }
}

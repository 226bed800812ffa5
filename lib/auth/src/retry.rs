//! Bounded retry schedule for the admin lookup.
//!
//! Right after sign-in the allow-list may not yet reflect a freshly granted
//! admin, so a negative result is re-checked a few times before it sticks.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// `base * (attempt + 1)`.
    #[default]
    Linear,
    /// `base * 2^attempt`.
    Exponential,
}

/// Retry schedule for a session whose admin flag is still false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional lookups after the first one.
    /// Default: 3
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    /// Default: 1000
    #[serde(default = "default_base_delay_ms")]
    base_delay_ms: u64,
    /// Growth of the delay between retries.
    #[serde(default)]
    backoff: Backoff,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl RetryPolicy {
    /// Creates a retry policy.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            base_delay_ms: u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX),
            backoff,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO, Backoff::Linear)
    }

    /// Returns the number of retries allowed after the first lookup.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay before the first retry.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Returns the backoff curve.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Returns the delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay();
        match self.backoff {
            Backoff::Linear => base.saturating_mul(attempt.saturating_add(1)),
            Backoff::Exponential => {
                let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
                base.saturating_mul(factor)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff: Backoff::default(),
        }
    }
}

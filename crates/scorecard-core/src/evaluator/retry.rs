//! Exponential backoff for transient judge failures.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::judge::JudgeError;

/// Retry budget for one metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `attempt + 1`, where `attempt` is the
    /// zero-based index of the attempt that just failed.
    ///
    /// `base × 2^attempt` plus up to 25% jitter, capped at `max_delay_ms`.
    /// A server-supplied `Retry-After` wins when it is longer.
    pub fn backoff(&self, attempt: u32, error: &JudgeError) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let jitter = if exponential == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=exponential / 4)
        };
        let mut delay_ms = exponential.saturating_add(jitter);
        if let Some(retry_after) = error.retry_after() {
            delay_ms = delay_ms.max(retry_after.as_millis().min(u64::MAX as u128) as u64);
        }
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

//! Timeout and bounded-retry policy for backend/rerank/embedding calls
//!
//! Per-call timeout (default 30s) and bounded retry (3 attempts,
//! exponential backoff, base 1s, cap 10s) apply only to transient errors
//! (network, 429, 502/503/504, timeouts) — `VhError::is_retryable` draws
//! that line.

use std::future::Future;
use std::time::Duration;

use crate::error::{Result, VhError};

/// Retry/timeout policy, with literal defaults.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub per_call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            per_call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff delay before attempt `attempt` (1-indexed),
    /// capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_millis() as u64 * 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(scaled).min(self.max_delay)
    }
}

/// Run `f` under `policy`: each attempt is wrapped in a timeout, and a
/// retryable error is retried with exponential backoff up to
/// `max_attempts`. A non-retryable error or timeout exhaustion returns
/// immediately/after the final attempt.
pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, mut f: F) -> Result<T>
where
F: FnMut() -> Fut,
Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let outcome = tokio::time::timeout(policy.per_call_timeout, f()).await;

        let result = match outcome {
            Ok(r) => r,
            Err(_) => Err(VhError::TransientNetwork(format!(
                        "call timed out after {:?}",
                        policy.per_call_timeout
                    ))),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                tokio::time::sleep(policy.backoff_delay(attempt)).await;
                continue;
            }
            Err(err) => return Err(err),
        }
    }
}

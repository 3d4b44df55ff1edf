//! Token-bucket rate limiter for embedding generation calls
//!
//! Default 50 calls/minute. Only the embedding provider calls made during
//! sync are rate-limited; backend queries are governed by `retry::RetryPolicy`
//! alone.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// `calls_per_minute` tokens, refilled continuously at that rate; the
    /// bucket starts full so a burst at startup doesn't immediately stall.
    pub fn new(calls_per_minute: u32) -> Self {
        let capacity = calls_per_minute as f64;
        Self {
            capacity,
            refill_per_sec: capacity / 60.0,
            state: Mutex::new(BucketState {
                    tokens: capacity,
                    last_refill: Instant::now(),
                }),
        }
    }

    pub fn default_for_embeddings() -> Self {
        Self::new(50)
    }

    /// Block until one token is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
                }
            };

            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }

    /// Non-blocking check: would `acquire` return immediately right now?
    pub async fn would_block(&self) -> bool {
        let state = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        (state.tokens + elapsed * self.refill_per_sec).min(self.capacity) < 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bucket_starts_full_and_drains() {
        let limiter = RateLimiter::new(2);
        assert!(!limiter.would_block().await);
        limiter.acquire().await;
        assert!(!limiter.would_block().await);
        limiter.acquire().await;
        assert!(limiter.would_block().await);
    }

    #[tokio::test]
    async fn refills_over_time() {
        let limiter = RateLimiter::new(60); // one token per second
        limiter.acquire().await;
        limiter.acquire().await;
        tokio::time::pause();
        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(!limiter.would_block().await);
    }
}

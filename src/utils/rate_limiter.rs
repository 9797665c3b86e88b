use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter as Governor};
use nonzero_ext::nonzero;
use std::time::Duration;
use tokio::time::sleep;

/// Paces requests against one backend: at most one permit per second through
/// the governor, plus a fixed per-request delay on top.
pub struct RateLimiter {
    governor: Governor<NotKeyed, InMemoryState, DefaultClock>,
    delay: Duration,
}

impl RateLimiter {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            governor: Governor::direct(Quota::per_second(nonzero!(1u32))),
            delay,
        }
    }

    /// Wait until the next request is allowed.
    pub async fn wait(&self) {
        while self.governor.check().is_err() {
            sleep(Duration::from_millis(100)).await;
        }
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_applies_configured_delay() {
        let limiter = RateLimiter::with_delay(Duration::from_millis(100));
        let start = std::time::Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_zero_delay_does_not_block_first_call() {
        let limiter = RateLimiter::with_delay(Duration::ZERO);
        limiter.wait().await;
    }
}

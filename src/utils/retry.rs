use std::time::Duration;

/// Bounded recovery for transient backend errors: a fixed number of retries
/// with a fixed delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Retry exactly once after `delay`.
    pub fn once_after(delay: Duration) -> Self {
        Self {
            max_retries: 1,
            delay,
        }
    }

    /// Total attempts, the first one included.
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

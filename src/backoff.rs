use std::time::Duration;

use rand::TryRngCore;
use rand::rngs::OsRng;

/// Exponential backoff with jitter.
/// Based on https://www.awsarchitectureblog.com/2015/03/backoff.html.
pub(crate) struct RetryBackoff {
    attempt: u32,
    base_ms: u64,
    cap_ms: u64,
}

impl RetryBackoff {
    pub(crate) fn new(cap: Duration) -> Self {
        Self {
            attempt: 0,
            base_ms: 100,
            cap_ms: cap.as_millis() as u64,
        }
    }

    fn max_wait_ms(&self) -> u64 {
        let shift = self.attempt.min(63);
        self.cap_ms.min(self.base_ms.saturating_mul(1u64 << shift))
    }

    // Returns the delay before the next attempt and advances the attempt count.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let max_wait = self.max_wait_ms();
        let wait_ms = if max_wait > 0 {
            OsRng.try_next_u64().unwrap_or(0) % max_wait
        } else {
            0
        };
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(wait_ms)
    }
}

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum spacing between calls to one external API
///
/// `wait` reserves the next free slot under a short lock and then sleeps
/// until it, so concurrent callers are spaced out instead of all firing once
/// the interval passes.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum time between two recorded calls
    min_interval: Duration,

    /// Time of the last recorded (or reserved) call
    last_request_time: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter with the given minimum spacing
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request_time: Mutex::new(None),
        }
    }

    /// Creates a limiter from a millisecond interval as found in the config
    pub fn from_millis(min_interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_interval_ms))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Calculates the time until the next call may be made
    ///
    /// Returns None if a call can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = *self
            .last_request_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let next = last? + self.min_interval;
        if next > now {
            Some(next - now)
        } else {
            None
        }
    }

    /// Suspends the current task until the minimum interval has elapsed
    ///
    /// Records the moment it returns as the new last call time.
    pub async fn wait(&self) {
        let slot = {
            let mut last = self
                .last_request_time
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            let slot = match *last {
                Some(prev) => (prev + self.min_interval).max(now),
                None => now,
            };
            *last = Some(slot);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}

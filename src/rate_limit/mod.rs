// Outbound request pacing shared across all concurrent callers
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Global throttle on the rate of dispatch starts.
///
/// A single mutex slot serializes `acquire` calls: the holder computes how
/// long to wait so that successive dispatches are at least `min_interval`
/// apart, sleeps if needed, stamps the dispatch time and releases. The lock
/// is never held across the downstream call itself, so a slow request delays
/// others only by the floor spacing.
pub struct RateLimiter {
    min_interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_second: NonZeroU32) -> Self {
        Self {
            min_interval: Duration::from_secs_f64(1.0 / requests_per_second.get() as f64),
            last_dispatch: Mutex::new(None),
        }
    }

    /// Suspend until this caller is allowed to dispatch. Never fails.
    pub async fn acquire(&self) {
        let mut last = self.last_dispatch.lock().await;

        if let Some(previous) = *last {
            let since_last = Instant::now().duration_since(previous);
            if since_last < self.min_interval {
                tokio::time::sleep(self.min_interval - since_last).await;
            }
        }

        *last = Some(Instant::now());
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

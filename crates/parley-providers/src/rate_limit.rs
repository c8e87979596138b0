//! Minimum spacing between backend calls.

use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};

/// Default spacing between consecutive calls.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Enforces a minimum interval between consecutive permitted calls.
///
/// One call per `min_interval` with a burst of one. Owned by whoever issues
/// the calls; there is no process-wide state. A zero interval disables it.
pub struct RateLimiter {
    min_interval: Duration,
    limiter: Option<Governor<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            limiter: Quota::with_period(min_interval).map(Governor::direct),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until `min_interval` has elapsed since the previous permitted call.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                tracing::debug!(
                    interval_ms = self.min_interval.as_millis() as u64,
                    "Rate limiting backend call"
                );
                limiter.until_ready().await;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_interval", &self.min_interval)
            .finish()
    }
}

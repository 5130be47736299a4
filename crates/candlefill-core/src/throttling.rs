use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::Quota;
use tracing::debug;

type DirectRateLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared token source bounding the aggregate rate of remote calls.
///
/// Tokens are spaced evenly at `1 / N` seconds with no burst, so any rolling
/// one-second window holds at most `N` acquisitions. Clones share one budget.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DirectRateLimiter>,
    per_second: NonZeroU32,
}

impl RateLimiter {
    pub fn per_second(requests_per_second: u32) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(governor::RateLimiter::direct(quota_from_rate(per_second))),
            per_second,
        }
    }

    pub const fn rate(&self) -> u32 {
        self.per_second.get()
    }

    /// Wait until a token is available and consume it. Never rejects.
    pub async fn take(&self) {
        let started = Instant::now();
        self.limiter.until_ready().await;

        let waited = started.elapsed();
        if waited >= Duration::from_millis(1) {
            debug!(waited_ms = waited.as_millis() as u64, "rate limit token acquired");
        }
    }
}

fn quota_from_rate(per_second: NonZeroU32) -> Quota {
    let seconds_per_cell = (1.0 / f64::from(per_second.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(per_second))
        .allow_burst(NonZeroU32::MIN)
}

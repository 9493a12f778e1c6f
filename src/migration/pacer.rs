use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};
use tracing::warn;

/// Ceiling for the gap between sends; keeps `Instant` arithmetic in range.
const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Keeps consecutive sends at least `1 / messages_per_second` apart.
///
/// Modeled as a single interval slot: `wait` suspends until the slot opens,
/// `mark_sent` books the next one. The first send goes out immediately.
#[derive(Debug)]
pub struct RatePacer {
    interval: Duration,
    next: Option<Instant>,
}

impl RatePacer {
    pub fn new(messages_per_second: f64) -> Self {
        let interval = if messages_per_second > 0.0 {
            Duration::try_from_secs_f64(1.0 / messages_per_second)
                .unwrap_or(MAX_INTERVAL)
                .min(MAX_INTERVAL)
        } else {
            Duration::ZERO
        };
        Self {
            interval,
            next: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Suspend until the next send is allowed.
    pub async fn wait(&self) {
        if let Some(next) = self.next {
            sleep_until(next).await;
        }
    }

    /// Record that a send attempt resolved (sent or permanently failed).
    pub fn mark_sent(&mut self) {
        self.next = Some(Instant::now() + self.interval);
    }

    /// Honour a flood-control signal: sleep exactly the requested duration.
    pub async fn absorb_throttle(&self, retry_after: Duration) {
        warn!("Rate limited. Waiting {:?}...", retry_after);
        sleep(retry_after).await;
    }
}

/// How many times a throttled send is retried before it counts as failed.
/// Permanent errors are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_throttle_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_throttle_retries: 1,
        }
    }
}

impl RetryPolicy {
    pub fn allows_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_throttle_retries
    }
}

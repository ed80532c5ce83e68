use rand::Rng;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::trace;

/// Enforces a minimum, jittered interval between outbound network requests.
///
/// One instance exists per crawl worker and is threaded through every fetch
/// that worker makes; workers for different newspapers each carry their own.
pub struct RateLimiter {
    /// Minimum gap between two consecutive requests
    min_delay: Duration,

    /// Instant the previous request was cleared to start (recorded after
    /// the sleep, not before)
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: None,
        }
    }

    /// Block until at least `min_delay` has elapsed since the previous
    /// request started, plus a uniformly random jitter in `[0, min_delay)`.
    ///
    /// The jitter keeps the access pattern from being a fixed, scrapable
    /// cadence. If the caller has already been busy for longer than
    /// `min_delay`, only the jitter is slept.
    pub async fn wait_turn(&mut self) {
        let jitter_ms = match self.min_delay.as_millis() as u64 {
            0 => 0,
            max => rand::thread_rng().gen_range(0..max),
        };

        let mut delay = Duration::from_millis(jitter_ms);

        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                delay += self.min_delay - elapsed;
            }
        }

        if !delay.is_zero() {
            trace!("Throttling next request for {:?}", delay);
            sleep(delay).await;
        }

        self.last_request = Some(Instant::now());
    }
}

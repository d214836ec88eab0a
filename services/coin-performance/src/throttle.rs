//! Throttle gate shared by every outbound upstream request.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum spacing between consecutive request dispatches.
///
/// One timestamp is shared by all callers. The lock is held across the wait,
/// so concurrent callers pass through one at a time in arrival order.
#[derive(Debug)]
pub struct ThrottleGate {
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl ThrottleGate {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait for the next free slot and claim it. Returns the dispatch instant.
    pub async fn acquire(&self) -> Instant {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let wait = self.delay - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "Rate limiting");
                tokio::time::sleep(wait).await;
            }
        }

        let now = Instant::now();
        *last = Some(now);
        now
    }

    /// Instant of the most recent dispatch, if any
    pub async fn last_request(&self) -> Option<Instant> {
        *self.last_request.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const DELAY: Duration = Duration::from_millis(1200);

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_not_delayed() {
        let gate = ThrottleGate::new(DELAY);
        let start = Instant::now();

        let dispatched = gate.acquire().await;

        assert_eq!(dispatched, start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_requests_are_spaced() {
        let gate = ThrottleGate::new(DELAY);

        let first = gate.acquire().await;
        let second = gate.acquire().await;
        let third = gate.acquire().await;

        assert!(second - first >= DELAY);
        assert!(third - second >= DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_idle_period() {
        let gate = ThrottleGate::new(DELAY);
        gate.acquire().await;

        tokio::time::advance(Duration::from_secs(5)).await;
        let before = Instant::now();
        let dispatched = gate.acquire().await;

        assert_eq!(dispatched, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_serialize() {
        let gate = Arc::new(ThrottleGate::new(DELAY));

        let (a, b, c) = tokio::join!(gate.acquire(), gate.acquire(), gate.acquire());

        let mut times = vec![a, b, c];
        times.sort();
        assert!(times[1] - times[0] >= DELAY);
        assert!(times[2] - times[1] >= DELAY);
        assert_eq!(gate.last_request().await, Some(times[2]));
    }
}

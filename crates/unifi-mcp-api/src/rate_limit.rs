// Sliding-window rate limiter
//
// Records the instant of every admitted request and refuses to admit a
// new one while `max_requests` admissions already sit inside the trailing
// window. Waiters sleep without holding the lock and re-check on wakeup,
// since other waiters may have taken the freed slot first.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Default admissions per window for a local controller.
pub const DEFAULT_MAX_REQUESTS: usize = 1000;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Async admission control bounding outbound request rate.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    /// A `max_requests` of zero is treated as one; a limiter that never
    /// admits anything would hang every caller.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            max_requests,
            window,
            admitted: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a request may be sent, then record it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut admitted = self.admitted.lock().await;
                let now = Instant::now();
                prune(&mut admitted, now, self.window);

                if admitted.len() < self.max_requests {
                    admitted.push_back(now);
                    return;
                }

                // Non-empty: len >= max_requests >= 1.
                admitted
                    .front()
                    .map_or(Duration::ZERO, |oldest| {
                        self.window.saturating_sub(now.duration_since(*oldest))
                    })
            };

            debug!(?wait, "rate limit reached, waiting");
            if wait.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(wait).await;
            }
        }
    }

    /// Number of admissions currently inside the window.
    pub async fn in_window(&self) -> usize {
        let mut admitted = self.admitted.lock().await;
        prune(&mut admitted, Instant::now(), self.window);
        admitted.len()
    }
}

/// Drop admissions at or beyond the trailing edge of the window.
fn prune(admitted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = admitted.front() {
        if now.duration_since(*oldest) >= window {
            admitted.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_limit_without_waiting() {
        let limiter = RateLimiter::new(3, Duration::from_secs(10));
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.in_window().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_oldest_to_leave_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();

        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(4)).await;
        limiter.acquire().await;

        // Third admission has to wait until the first one is 10s old.
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(limiter.in_window().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_frees_slots() {
        let limiter = RateLimiter::new(1, Duration::from_secs(5));
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(limiter.in_window().await, 0);

        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_limit_is_clamped() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.max_requests(), 1);
        limiter.acquire().await;
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_never_exceed_cap() {
        let max = 3;
        let window = Duration::from_secs(10);
        let limiter = Arc::new(RateLimiter::new(max, window));

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(handle.await.expect("task panicked"));
        }
        stamps.sort();

        // Any `max + 1` consecutive admissions must span at least one window.
        for pair in stamps.windows(max + 1) {
            let span = pair[max].duration_since(pair[0]);
            assert!(span >= window, "{} admissions within {span:?}", max + 1);
        }
    }
}

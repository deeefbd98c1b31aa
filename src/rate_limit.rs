use log::debug;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Process-wide gate keeping outbound calls at least `min_interval` apart.
///
/// Waiters queue on a fair async mutex, so admission is first-come
/// first-served. The timestamp is written only once the wait has finished;
/// a caller dropped mid-wait leaves it untouched.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call_start: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call_start: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Suspend until the next call may start, then record its start time.
    pub async fn admit(&self) {
        let mut last = self.last_call_start.lock().await;
        if let Some(prev) = *last {
            let deadline = prev + self.min_interval;
            let now = Instant::now();
            if now < deadline {
                debug!(
                    "Rate limiting: sleeping for {:.3}s",
                    (deadline - now).as_secs_f64()
                );
                sleep_until(deadline).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Start time of the most recently admitted call.
    pub async fn last_admitted(&self) -> Option<Instant> {
        *self.last_call_start.lock().await
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn first_call_is_not_delayed() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();
        limiter.admit().await;
        assert_eq!(Instant::now() - start, Duration::ZERO);
        assert!(limiter.last_admitted().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_admissions_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(250));
        let mut stamps = Vec::new();
        for _ in 0..6 {
            limiter.admit().await;
            stamps.push(Instant::now());
        }
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(250));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn no_wait_after_interval_elapsed() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        limiter.admit().await;
        tokio::time::advance(Duration::from_millis(500)).await;
        let before = Instant::now();
        limiter.admit().await;
        assert_eq!(Instant::now() - before, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_never_share_a_slot() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(200)));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            tasks.push(tokio::spawn(async move {
                limiter.admit().await;
                Instant::now()
            }));
        }
        let mut stamps = Vec::new();
        for t in tasks {
            stamps.push(t.await.unwrap());
        }
        stamps.sort();
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(200));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_does_not_record_a_call() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        limiter.admit().await;
        let first = limiter.last_admitted().await;

        let timed_out =
            tokio::time::timeout(Duration::from_millis(100), limiter.admit()).await;
        assert!(timed_out.is_err());
        assert_eq!(limiter.last_admitted().await, first);

        // The next caller is gated by the real previous call, not the abandoned one.
        let before = Instant::now();
        limiter.admit().await;
        assert_eq!(Instant::now() - before, Duration::from_millis(900));
    }
}

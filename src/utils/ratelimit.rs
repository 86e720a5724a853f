//! Client-side REST rate limiter: sliding window per client instance.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

pub struct RateLimiter {
    state: Mutex<Window>,
}

struct Window {
    sent: VecDeque<Instant>,
    limit: usize,
    period: Duration,
}

impl Window {
    /// Record a send at `now`, or return how long to wait before retrying
    fn admit(&mut self, now: Instant) -> Duration {
        while self
            .sent
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.period)
        {
            self.sent.pop_front();
        }

        match self.sent.front() {
            Some(&oldest) if self.sent.len() >= self.limit => {
                self.period - now.duration_since(oldest)
            }
            _ => {
                self.sent.push_back(now);
                Duration::ZERO
            }
        }
    }
}

impl RateLimiter {
    /// At most `requests_per_second` sends per second; zero is treated as one
    pub fn new(requests_per_second: u32) -> Self {
        Self::with_period(requests_per_second.max(1) as usize, Duration::from_secs(1))
    }

    fn with_period(limit: usize, period: Duration) -> Self {
        Self {
            state: Mutex::new(Window {
                sent: VecDeque::with_capacity(limit),
                limit,
                period,
            }),
        }
    }

    fn admit(&self) -> Duration {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .admit(Instant::now())
    }

    /// Wait until a request may be sent, then count it
    pub async fn acquire(&self) {
        loop {
            let wait = self.admit();
            if wait.is_zero() {
                return;
            }
            debug!("REST rate limit: waiting {}ms", wait.as_millis());
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_up_to_limit_is_free() {
        let limiter = RateLimiter::new(5);
        assert!((0..5).all(|_| limiter.admit().is_zero()));
        assert!(!limiter.admit().is_zero());
    }

    #[test]
    fn test_wait_never_exceeds_period() {
        let limiter = RateLimiter::new(1);
        limiter.admit();
        let wait = limiter.admit();
        assert!(wait > Duration::ZERO && wait <= Duration::from_secs(1));
    }

    #[test]
    fn test_zero_rate_clamped_to_one() {
        let limiter = RateLimiter::new(0);
        assert!(limiter.admit().is_zero());
        assert!(!limiter.admit().is_zero());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_window() {
        let limiter = RateLimiter::with_period(1, Duration::from_millis(20));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Sliding-window rate limiting for search requests
//!
//! Tracks the timestamp of every accepted outbound call and admits a new
//! call only while fewer than `limit` timestamps fall inside the rolling
//! window. Checking and recording are separate operations: cache hits are
//! checked but never recorded.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Poll granularity for `wait_until_allowed`
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sliding-window rate limiter
pub struct RateLimiter {
    requests: Mutex<VecDeque<Instant>>,
    limit: usize,
    window: Duration,
    retry_after: Duration,
}

/// Snapshot of limiter state for diagnostics
#[derive(Debug, Clone)]
pub struct RateLimiterStatus {
    /// Requests recorded inside the current window
    pub used: usize,
    /// Maximum requests per window
    pub limit: usize,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Milliseconds until the next request would be admitted
    pub time_to_wait_ms: u64,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `limit` - Maximum accepted requests per window
    /// * `window_ms` - Rolling window length in milliseconds
    /// * `retry_after_ms` - Floor on the advertised wait when the window is full
    pub fn new(limit: usize, window_ms: u64, retry_after_ms: u64) -> Self {
        Self {
            requests: Mutex::new(VecDeque::new()),
            limit,
            window: Duration::from_millis(window_ms),
            retry_after: Duration::from_millis(retry_after_ms),
        }
    }

    /// Check whether a new request would be admitted right now
    ///
    /// Prunes timestamps that have left the window, then compares the
    /// remaining count against the limit. Does not record a request.
    pub fn check_limit(&self) -> bool {
        let now = Instant::now();
        let mut requests = self.lock();
        Self::prune(&mut requests, now, self.window);
        requests.len() < self.limit
    }

    /// Record an accepted outbound call
    ///
    /// Call only after a request was actually issued upstream, never on a
    /// cache hit.
    pub fn increment(&self) {
        self.lock().push_back(Instant::now());
    }

    /// Milliseconds until the next request would be admitted
    ///
    /// Zero while under the limit; otherwise the time until the oldest
    /// in-window timestamp expires, floored at `retry_after`.
    pub fn time_to_wait(&self) -> u64 {
        let now = Instant::now();
        let mut requests = self.lock();
        Self::prune(&mut requests, now, self.window);

        if requests.len() < self.limit {
            return 0;
        }

        let oldest = match requests.front() {
            Some(t) => *t,
            None => return 0,
        };
        let until_expiry = (oldest + self.window).saturating_duration_since(now);
        until_expiry.max(self.retry_after).as_millis() as u64
    }

    /// Sleep until a request would be admitted
    ///
    /// Bounded-latency poll loop: sleeps at most 100ms per iteration so a
    /// freed-up window is observed promptly.
    pub async fn wait_until_allowed(&self) {
        loop {
            let wait_ms = self.time_to_wait();
            if wait_ms == 0 {
                return;
            }
            let sleep_for = Duration::from_millis(wait_ms).min(WAIT_POLL_INTERVAL);
            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Snapshot the limiter state
    pub fn status(&self) -> RateLimiterStatus {
        let now = Instant::now();
        let used = {
            let mut requests = self.lock();
            Self::prune(&mut requests, now, self.window);
            requests.len()
        };
        RateLimiterStatus {
            used,
            limit: self.limit,
            window_ms: self.window.as_millis() as u64,
            time_to_wait_ms: self.time_to_wait(),
        }
    }

    /// Clear all recorded requests
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn prune(requests: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(front) = requests.front() {
            if now.duration_since(*front) > window {
                requests.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        match self.requests.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = RateLimiter::new(3, 1000, 1000);
        for _ in 0..3 {
            assert!(limiter.check_limit());
            limiter.increment();
        }
        assert!(!limiter.check_limit());
    }

    #[test]
    fn test_check_does_not_record() {
        let limiter = RateLimiter::new(2, 1000, 1000);
        for _ in 0..10 {
            assert!(limiter.check_limit());
        }
        assert_eq!(limiter.status().used, 0);
    }

    #[test]
    fn test_time_to_wait_zero_under_limit() {
        let limiter = RateLimiter::new(5, 1000, 1000);
        limiter.increment();
        assert_eq!(limiter.time_to_wait(), 0);
    }

    #[test]
    fn test_time_to_wait_floored_at_retry_after() {
        let limiter = RateLimiter::new(1, 50, 1000);
        limiter.increment();
        // Window expiry is at most 50ms away but the floor is 1000ms.
        assert!(limiter.time_to_wait() >= 1000);
    }

    #[test]
    fn test_window_expiry_readmits() {
        let limiter = RateLimiter::new(1, 20, 1);
        limiter.increment();
        assert!(!limiter.check_limit());
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check_limit());
    }

    #[test]
    fn test_reset_clears_state() {
        let limiter = RateLimiter::new(1, 60_000, 1000);
        limiter.increment();
        assert!(!limiter.check_limit());
        limiter.reset();
        assert!(limiter.check_limit());
        assert_eq!(limiter.status().used, 0);
    }

    #[test]
    fn test_status_snapshot() {
        let limiter = RateLimiter::new(4, 2000, 500);
        limiter.increment();
        limiter.increment();
        let status = limiter.status();
        assert_eq!(status.used, 2);
        assert_eq!(status.limit, 4);
        assert_eq!(status.window_ms, 2000);
        assert_eq!(status.time_to_wait_ms, 0);
    }

    #[tokio::test]
    async fn test_wait_until_allowed_returns_when_free() {
        let limiter = RateLimiter::new(1, 50, 1);
        limiter.increment();
        let start = Instant::now();
        limiter.wait_until_allowed().await;
        // Must have waited at least until the window expired.
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert!(limiter.check_limit());
    }
}

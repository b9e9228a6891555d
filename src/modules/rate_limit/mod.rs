//! Sliding-window request limiter.
//!
//! Grants at most `max_requests` slots per `period`. The window rolls over
//! lazily on the next access once the period has elapsed, so no background
//! timer is involved. A single limiter can be shared between dispatchers via
//! `Arc<RateLimiter>`.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct WindowState {
    max_requests: u32,
    period: Duration,
    count: u32,
    window_start: Instant,
}

impl WindowState {
    fn roll_if_elapsed(&mut self, now: Instant) {
        if now.duration_since(self.window_start) > self.period {
            self.count = 0;
            self.window_start = now;
        }
    }
}

/// Read-only view of the limiter at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub count: u32,
    pub max_requests: u32,
    pub period: Duration,
}

#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<WindowState>,
    poll_interval: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, period: Duration) -> Result<Self, RateLimitError> {
        validate_bounds(max_requests, period)?;
        Ok(Self {
            state: Mutex::new(WindowState {
                max_requests,
                period,
                count: 0,
                window_start: Instant::now(),
            }),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Overrides the interval used by the waiting acquisitions.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Takes a slot if the current window has one left.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        state.roll_if_elapsed(Instant::now());
        if state.count < state.max_requests {
            state.count += 1;
            true
        } else {
            false
        }
    }

    /// Polls until a slot is granted. There is no timeout.
    pub fn acquire_blocking(&self) {
        while !self.try_acquire() {
            log::debug!(
                "rate limit saturated, polling again in {:.2}s",
                self.poll_interval.as_secs_f64()
            );
            std::thread::sleep(self.poll_interval);
        }
    }

    /// Async counterpart of [`RateLimiter::acquire_blocking`].
    pub async fn acquire(&self) {
        while !self.try_acquire() {
            log::debug!(
                "rate limit saturated, polling again in {:.2}s",
                self.poll_interval.as_secs_f64()
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub fn reset(&self) {
        let mut state = self.lock();
        state.count = 0;
        state.window_start = Instant::now();
    }

    /// Replaces both bounds. The in-progress window is kept.
    pub fn reconfigure(&self, max_requests: u32, period: Duration) -> Result<(), RateLimitError> {
        validate_bounds(max_requests, period)?;
        let mut state = self.lock();
        state.max_requests = max_requests;
        state.period = period;
        Ok(())
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        let state = self.lock();
        RateLimitSnapshot {
            count: state.count,
            max_requests: state.max_requests,
            period: state.period,
        }
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn validate_bounds(max_requests: u32, period: Duration) -> Result<(), RateLimitError> {
    if max_requests == 0 {
        return Err(RateLimitError::InvalidBounds("max_requests must be positive"));
    }
    if period.is_zero() {
        return Err(RateLimitError::InvalidBounds("period must be positive"));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("invalid rate limit bounds: {0}")]
    InvalidBounds(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn saturates_then_rolls_over() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1)).unwrap();
        let grants: Vec<bool> = (0..3).map(|_| limiter.try_acquire()).collect();
        assert_eq!(grants, vec![true, true, false]);

        std::thread::sleep(Duration::from_millis(1050));
        assert!(limiter.try_acquire());
    }

    #[test]
    fn reset_reopens_window() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60)).unwrap();
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        limiter.reset();
        assert!(limiter.try_acquire());
    }

    #[test]
    fn reconfigure_keeps_current_window() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60)).unwrap();
        assert!(limiter.try_acquire());
        limiter.reconfigure(3, Duration::from_secs(60)).unwrap();
        let snapshot = limiter.snapshot();
        assert_eq!(snapshot.count, 1);
        assert_eq!(snapshot.max_requests, 3);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn rejects_zero_bounds() {
        assert!(RateLimiter::new(0, Duration::from_secs(1)).is_err());
        assert!(RateLimiter::new(1, Duration::ZERO).is_err());
        let limiter = RateLimiter::new(1, Duration::from_secs(1)).unwrap();
        assert!(limiter.reconfigure(0, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn blocking_acquire_waits_for_next_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(100))
            .unwrap()
            .with_poll_interval(Duration::from_millis(20));
        limiter.acquire_blocking();
        let started = Instant::now();
        limiter.acquire_blocking();
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn concurrent_callers_never_exceed_bound() {
        let limiter = Arc::new(RateLimiter::new(5, Duration::from_secs(60)).unwrap());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.try_acquire())
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|granted| *granted)
            .count();
        assert_eq!(granted, 5);
    }

    #[tokio::test]
    async fn async_acquire_grants_slot() {
        let limiter = RateLimiter::new(1, Duration::from_millis(50))
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(limiter.snapshot().count, 1);
    }
}

//! Exponential-backoff retry executor.
//!
//! The policy knows nothing about what it retries. Delays follow
//! `backoff_factor * 2^(attempt - 1)` seconds and the original error of the
//! final attempt is handed back unchanged.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_factor: f64,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one, negative or NaN factors to zero.
    pub fn new(max_attempts: u32, backoff_factor: f64) -> Self {
        let backoff_factor = if backoff_factor.is_finite() && backoff_factor > 0.0 {
            backoff_factor
        } else {
            0.0
        };
        Self {
            max_attempts: max_attempts.max(1),
            backoff_factor,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    /// Delay scheduled after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(62) as i32;
        let secs = self.backoff_factor * 2f64.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Runs `operation`, sleeping the calling thread between attempts.
    pub fn execute<T, E, F>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        E: Display,
    {
        self.execute_with(operation, |_, delay| std::thread::sleep(delay))
    }

    /// Same loop as [`RetryPolicy::execute`] with a caller-provided sleeper.
    ///
    /// The sleeper receives the attempt that just failed and the backoff the
    /// policy computed for it. It is invoked `max_attempts - 1` times at most.
    pub fn execute_with<T, E, F, S>(&self, mut operation: F, mut sleeper: S) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        S: FnMut(u32, Duration),
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.max_attempts {
                        log::debug!("giving up after {} attempts: {}", attempt, err);
                        return Err(err);
                    }
                    let delay = self.backoff(attempt);
                    log::debug!(
                        "attempt {}/{} failed: {}; retrying in {:.2}s",
                        attempt,
                        self.max_attempts,
                        err,
                        delay.as_secs_f64()
                    );
                    sleeper(attempt, delay);
                    attempt += 1;
                }
            }
        }
    }

    /// Async variant sleeping on the tokio timer.
    pub async fn execute_async<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.max_attempts {
                        log::debug!("giving up after {} attempts: {}", attempt, err);
                        return Err(err);
                    }
                    let delay = self.backoff(attempt);
                    log::debug!(
                        "attempt {}/{} failed: {}; retrying in {:.2}s",
                        attempt,
                        self.max_attempts,
                        err,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1.0)
    }
}

//! Explicit retry policy with linear backoff.

use std::fmt;
use std::thread;
use std::time::Duration;

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Delay after the failed attempt number `attempt` (1-based): `base * attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(800))
    }
}

/// Blocking pause, injectable so tests can observe delays instead of waiting.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Runs `attempt_fn` until it succeeds or the policy's attempts are used up.
///
/// The closure receives the 1-based attempt number. Sleeps only between
/// attempts, never after the last one. Returns the final error on exhaustion.
pub fn retry_with_backoff<T, E: fmt::Display>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    label: &str,
    mut attempt_fn: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 1u32;
    loop {
        match attempt_fn(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts => {
                tracing::debug!(
                    "{label}: attempt {attempt}/{} failed: {err}, retrying",
                    policy.max_attempts
                );
                sleeper.sleep(policy.backoff(attempt));
                attempt += 1;
            }
            Err(err) => {
                tracing::warn!(
                    "{label}: attempt {attempt}/{} failed: {err}, giving up",
                    policy.max_attempts
                );
                return Err(err);
            }
        }
    }
}

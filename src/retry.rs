//! Bounded retries for calls to remote collaborators
//!
//! Fetching the background annotation or precomputed results involves
//! network requests that fail every now and then. [`RetryPolicy`] repeats
//! such a call a fixed number of times with a fixed delay in between.
use std::fmt::Display;
use std::thread;
use std::time::Duration;

use tracing::warn;

/// Maximum attempts used by [`RetryPolicy::default`]
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Retry policy with a fixed number of attempts and a fixed delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_secs(1),
        }
    }
}

/// The error of the last attempt, after all attempts failed
#[derive(Debug)]
pub struct RetryExhausted<E> {
    /// The number of attempts made
    pub attempts: u32,
    /// The error of the final attempt
    pub last_error: E,
}

impl RetryPolicy {
    /// Constructs a new [`RetryPolicy`]
    ///
    /// `max_attempts` includes the first call and is at least 1
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A policy that calls only once
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// The maximum number of attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The delay between two attempts
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Calls `f` until it succeeds or the attempts are used up
    ///
    /// There is no delay after the final attempt.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt if all attempts fail
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use gsenrich::RetryPolicy;
    ///
    /// let policy = RetryPolicy::new(3, Duration::ZERO);
    /// let mut calls = 0;
    /// let res: Result<u32, _> = policy.call("counting", || {
    ///     calls += 1;
    ///     if calls < 3 { Err("not yet") } else { Ok(calls) }
    /// });
    /// assert_eq!(res.unwrap(), 3);
    /// ```
    pub fn call<T, E, F>(&self, operation: &str, mut f: F) -> Result<T, RetryExhausted<E>>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        error = %err,
                        "giving up after final attempt"
                    );
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                Err(err) => {
                    warn!(
                        operation,
                        attempt,
                        delay_ms = self.delay.as_millis(),
                        error = %err,
                        "attempt failed, retrying"
                    );
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.delay(), Duration::from_secs(1));
    }

    #[test]
    fn at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn succeeds_first_time() {
        let mut calls = 0;
        let res: Result<&str, RetryExhausted<String>> =
            RetryPolicy::new(5, Duration::ZERO).call("test", || {
                calls += 1;
                Ok("done")
            });
        assert_eq!(res.unwrap(), "done");
        assert_eq!(calls, 1);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let res: Result<(), _> = RetryPolicy::new(4, Duration::ZERO).call("test", || {
            calls += 1;
            Err(format!("failure {calls}"))
        });
        let err = res.unwrap_err();
        assert_eq!(err.attempts, 4);
        assert_eq!(err.last_error, "failure 4");
        assert_eq!(calls, 4);
    }

    #[test]
    fn once_does_not_retry() {
        let mut calls = 0;
        let res: Result<(), _> = RetryPolicy::once().call("test", || {
            calls += 1;
            Err("nope")
        });
        assert!(res.is_err());
        assert_eq!(calls, 1);
    }
}

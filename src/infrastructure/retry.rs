use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use log::debug;

/// Bounded retry with linear backoff: the wait after attempt `n` is
/// `base_delay * n`. Only errors accepted by `retryable` are retried.
pub struct RetryPolicy<E> {
    pub max_attempts: u32,
    pub base_delay: Duration,
    retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            retryable: self.retryable,
        }
    }
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl<E: Display> RetryPolicy<E> {
    pub fn new(max_attempts: u32, base_delay: Duration, retryable: fn(&E) -> bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            retryable,
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    fn should_retry(&self, attempt: u32, error: &E) -> bool {
        attempt < self.max_attempts && (self.retryable)(error)
    }

    /// Runs `op` (given the 1-based attempt number) until it succeeds, fails
    /// with a non-retryable error, or the attempts run out.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(attempt, &e) => {
                    let delay = self.delay_after(attempt);
                    debug!("{label}: attempt {attempt}/{} failed ({e}); retrying in {delay:?}", self.max_attempts);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Blocking counterpart of [`RetryPolicy::run`].
    pub fn run_blocking<T, F>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(attempt, &e) => {
                    let delay = self.delay_after(attempt);
                    debug!("{label}: attempt {attempt}/{} failed ({e}); retrying in {delay:?}", self.max_attempts);
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, PartialEq)]
    enum Failure {
        Flaky,
        Fatal,
    }

    impl Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy<Failure> {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), |e| *e == Failure::Flaky)
    }

    #[test]
    fn backoff_is_linear() {
        let p = RetryPolicy::<Failure>::new(3, Duration::from_millis(700), |_| true);
        assert_eq!(p.delay_after(1), Duration::from_millis(700));
        assert_eq!(p.delay_after(3), Duration::from_millis(2100));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Failure> = policy(0).run_blocking("test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Failure::Flaky)
        });
        assert_eq!(result, Err(Failure::Flaky));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blocking_retries_until_success() {
        let result = policy(4).run_blocking("test", |attempt| {
            if attempt < 3 {
                Err(Failure::Flaky)
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Failure> = policy(3)
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::Flaky) }
            })
            .await;
        assert_eq!(result, Err(Failure::Flaky));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Failure> = policy(3)
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::Fatal) }
            })
            .await;
        assert_eq!(result, Err(Failure::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! Bounded retry with exponential backoff.
//!
//! The combinator knows nothing about SSH. Anything that can be attempted
//! repeatedly without extra side effects implements [`IdempotentAction`] and is
//! driven by [`retry`] under a [`RetryPolicy`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use tracing::warn;

use crate::error::Error;

/// How many times to attempt an action and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
    pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);

    /// # Errors
    ///
    /// If `max_attempts` is zero.
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Result<Self, Error> {
        if max_attempts == 0 {
            return Err(Error::InvalidRetryPolicy { max_attempts });
        }
        Ok(Self {
            max_attempts,
            base_backoff,
        })
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn base_backoff(&self) -> Duration {
        self.base_backoff
    }

    /// Delay inserted after failed attempt number `attempt` (counting from 1),
    /// i.e. `base_backoff * 2^(attempt - 1)`. Saturates instead of overflowing.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1);
        let factor = 1u32.checked_shl(shift).unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            base_backoff: Self::DEFAULT_BASE_BACKOFF,
        }
    }
}

/// An operation that is safe to repeat after a failed attempt.
#[async_trait]
pub trait IdempotentAction: Send {
    type Output: Send;
    type Error: fmt::Debug + Send;

    /// Short human description used in logs, e.g. `connect to 10.0.0.5:22`.
    fn describe(&self) -> String;

    async fn attempt(&mut self) -> Result<Self::Output, Self::Error>;
}

/// [`IdempotentAction`] built from a closure that returns a future.
pub struct FnAction<F> {
    description: String,
    f: F,
}

impl<F> FnAction<F> {
    pub fn new(description: impl Into<String>, f: F) -> Self {
        Self {
            description: description.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut, T, E> IdempotentAction for FnAction<F>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T, E>> + Send,
    T: Send,
    E: fmt::Debug + Send,
{
    type Output = T;
    type Error = E;

    fn describe(&self) -> String {
        self.description.clone()
    }

    async fn attempt(&mut self) -> Result<T, E> {
        (self.f)().await
    }
}

/// The last failure of an action that ran out of attempts.
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub source: E,
}

/// Runs `action` until it succeeds or `policy` runs out of attempts.
///
/// Sleeps happen strictly between attempts: never before the first one, after
/// a success, or after the final failure.
///
/// # Errors
///
/// The error of the last attempt, together with the number of attempts made.
pub async fn retry<A>(
    policy: &RetryPolicy,
    action: &mut A,
) -> Result<A::Output, RetryError<A::Error>>
where
    A: IdempotentAction + ?Sized,
{
    let what = action.describe();
    let mut attempt = 1;
    loop {
        match action.attempt().await {
            Ok(output) => {
                debug!(%what, attempt, "attempt succeeded");
                return Ok(output);
            }
            Err(error) if attempt >= policy.max_attempts => {
                warn!(%what, attempt, ?error, "giving up");
                return Err(RetryError {
                    attempts: attempt,
                    source: error,
                });
            }
            Err(error) => {
                let delay = policy.backoff(attempt);
                warn!(%what, attempt, max_attempts = policy.max_attempts, ?error, "attempt failed");
                debug!(%what, ?delay, "backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

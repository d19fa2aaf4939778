//! Failure classification and workflow-level retry.
//!
//! Only commit-time conflicts are retried: nothing became durable, so the
//! workflow can safely run again from scratch and observe the winner's
//! committed state. Domain failures are deterministic, and an
//! acknowledgment timeout must never be blindly re-run (risk of
//! double-apply); both propagate untouched.

use std::time::Duration;

use tracing::warn;

use crate::coordinator::TxnError;

/// Retry configuration for transient transaction conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    /// Three attempts with a one-second pause between them.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// No pause between attempts. Useful in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether the failure is transient contention worth re-running the
    /// whole workflow for.
    pub fn is_retryable<E>(error: &TxnError<E>) -> bool {
        matches!(error, TxnError::Conflict(_))
    }

    /// Run `attempt` until it succeeds, fails non-transiently, or the
    /// attempt budget is exhausted.
    pub fn run<T, E, F>(&self, mut attempt: F) -> Result<T, TxnError<E>>
    where
        F: FnMut() -> Result<T, TxnError<E>>,
    {
        let mut attempts = 1;
        loop {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(error) if Self::is_retryable(&error) && attempts < self.max_attempts => {
                    warn!(attempts, "transaction conflict, retrying workflow");
                    if !self.backoff.is_zero() {
                        std::thread::sleep(self.backoff);
                    }
                    attempts += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

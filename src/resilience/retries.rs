//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a downstream outcome is worth another attempt
//! - Bound the number of attempts per request
//! - Provide the delay between attempts
//!
//! # Design Decisions
//! - Only server errors (status >= 500) and handler failures are retried
//! - Client errors are terminal: the caller sent something wrong
//! - No delay follows the last failed attempt: with the default schedule an
//!   exhausted request answers 503 after 15s of backoff (1+2+4+8) instead of
//!   sleeping another 16s, and its concurrency slot is freed that much sooner
//! - Replaying is safe because the request body is buffered once up front;
//!   idempotency of the handler remains the caller's responsibility

use std::time::Duration;

use axum::http::StatusCode;

use crate::resilience::backoff::BackoffPolicy;

/// Attempt bound plus backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total downstream invocations, including the first.
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RetryPolicy {
    /// A policy that invokes the handler exactly once.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Attempts actually made; never below one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Whether another attempt follows attempt `attempt` (1-based).
    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.attempts()
    }

    /// Delay to sleep after failed attempt `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

/// Whether a captured status ends the retry loop.
pub fn is_terminal(status: StatusCode) -> bool {
    status.as_u16() < 500
}

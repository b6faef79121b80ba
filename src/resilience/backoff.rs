//! Exponential backoff with optional cap and jitter.

use std::time::Duration;

use rand::Rng;

/// How long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Factor applied after each failed attempt.
    pub multiplier: f64,
    /// Upper bound on a single delay; `None` lets it grow unbounded.
    pub max: Option<Duration>,
    /// Uniform jitter as a fraction of the delay.
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            multiplier: 2.0,
            max: None,
            jitter_ratio: 0.0,
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self)
    }
}

/// Calculate the exponential backoff delay for a failed attempt.
///
/// Attempt 1 waits `initial`, attempt 2 waits `initial * multiplier`, and so
/// on. Overflow saturates to `Duration::MAX` before the cap is applied.
pub fn calculate_backoff(attempt: u32, policy: &BackoffPolicy) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let factor = policy.multiplier.powi(exponent);
    let delay = Duration::try_from_secs_f64(policy.initial.as_secs_f64() * factor)
        .unwrap_or(Duration::MAX);
    let capped = match policy.max {
        Some(max) => delay.min(max),
        None => delay,
    };

    if policy.jitter_ratio <= 0.0 || capped.is_zero() {
        return capped;
    }

    let jitter = rand::thread_rng().gen_range(0.0..policy.jitter_ratio);
    capped.saturating_add(capped.mul_f64(jitter))
}

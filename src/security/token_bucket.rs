//! Single-client token bucket.

use std::time::Duration;

use tokio::time::Instant;

/// Refill rate expressed as `tokens` per `period`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefillRate {
    tokens: f64,
    period_secs: f64,
}

impl RefillRate {
    pub fn new(tokens: u32, period: Duration) -> Self {
        Self {
            tokens: f64::from(tokens),
            period_secs: period.as_secs_f64(),
        }
    }

    pub fn per_second(tokens: u32) -> Self {
        Self::new(tokens, Duration::from_secs(1))
    }

    /// Tokens accumulated over `elapsed`.
    ///
    /// Multiplies before dividing so whole multiples of the period refill
    /// exactly.
    fn tokens_for(&self, elapsed: Duration) -> f64 {
        if self.period_secs <= 0.0 {
            return 0.0;
        }
        elapsed.as_secs_f64() * self.tokens / self.period_secs
    }
}

/// Rate-limit state for one client.
///
/// Tokens are fractional and persist between calls; the level always stays
/// within `[0, capacity]`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    rate: RefillRate,
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32, rate: RefillRate, now: Instant) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            rate,
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    /// Refill for the time elapsed since the last call, then try to spend one
    /// token. `last_seen` is updated whether or not the token was granted.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if now > self.last_seen {
            self.last_seen = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        // A caller holding an older timestamp must not move the clock back.
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + self.rate.tokens_for(elapsed)).min(self.capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    /// Current token level (without refilling).
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// How long the client has been idle as of `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the pipeline.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::backoff::BackoffPolicy;
use crate::resilience::concurrency::GatePolicy;
use crate::resilience::retries::RetryPolicy;
use crate::security::token_bucket::RefillRate;

/// Root configuration for the request pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Concurrency gate settings.
    pub concurrency: ConcurrencyConfig,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Retry and backoff settings.
    pub retries: RetryConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Concurrency gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum number of requests in flight downstream at once.
    pub max_in_flight: usize,

    /// What to do when every slot is taken.
    pub policy: GatePolicy,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 3,
            policy: GatePolicy::Block,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Bucket capacity per client.
    pub burst_size: u32,

    /// Tokens refilled per period.
    pub requests_per_period: u32,

    /// Refill period in seconds.
    pub period_secs: u64,

    /// Clients idle longer than this are evicted by the janitor.
    pub idle_ttl_secs: u64,

    /// Janitor sweep interval in seconds.
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn refill_rate(&self) -> RefillRate {
        RefillRate::new(self.requests_per_period, Duration::from_secs(self.period_secs))
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst_size: 10,
            requests_per_period: 10,
            period_secs: 60,
            idle_ttl_secs: 300,   // 5 minutes
            sweep_interval_secs: 60,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of downstream invocations per request (1 disables retries).
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    pub initial_backoff_ms: u64,

    /// Factor applied to the delay after every failed attempt.
    pub multiplier: f64,

    /// Optional upper bound on a single delay in milliseconds.
    pub max_backoff_ms: Option<u64>,

    /// Uniform jitter as a fraction of the delay (0.0 disables jitter).
    pub jitter_ratio: f64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: BackoffPolicy {
                initial: Duration::from_millis(self.initial_backoff_ms),
                multiplier: self.multiplier,
                max: self.max_backoff_ms.map(Duration::from_millis),
                jitter_ratio: self.jitter_ratio,
            },
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 1000,
            multiplier: 2.0,
            max_backoff_ms: None,
            jitter_ratio: 0.0,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size buffered for replay, in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    /// Zero disables the timeout.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

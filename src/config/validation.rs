//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacities >= 1, ratios within bounds)
//! - Validate the listener address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PipelineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use tokio::sync::Semaphore;

use crate::config::schema::PipelineConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check every semantic constraint and collect the violations.
pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.concurrency.max_in_flight == 0 {
        errors.push(ValidationError::new("concurrency.max_in_flight", "must be at least 1"));
    } else if config.concurrency.max_in_flight > Semaphore::MAX_PERMITS {
        errors.push(ValidationError::new(
            "concurrency.max_in_flight",
            format!("must not exceed {}", Semaphore::MAX_PERMITS),
        ));
    }

    let rate_limit = &config.rate_limit;
    let positive = [
        ("rate_limit.burst_size", u64::from(rate_limit.burst_size)),
        ("rate_limit.requests_per_period", u64::from(rate_limit.requests_per_period)),
        ("rate_limit.period_secs", rate_limit.period_secs),
        ("rate_limit.idle_ttl_secs", rate_limit.idle_ttl_secs),
        ("rate_limit.sweep_interval_secs", rate_limit.sweep_interval_secs),
        ("retries.max_attempts", u64::from(config.retries.max_attempts)),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be at least 1"));
        }
    }

    let retries = &config.retries;
    if !retries.multiplier.is_finite() || retries.multiplier < 1.0 {
        errors.push(ValidationError::new(
            "retries.multiplier",
            "must be a finite number >= 1.0",
        ));
    }
    if !(0.0..=1.0).contains(&retries.jitter_ratio) {
        errors.push(ValidationError::new("retries.jitter_ratio", "must be within [0.0, 1.0]"));
    }
    if let Some(max) = retries.max_backoff_ms {
        if max < retries.initial_backoff_ms {
            errors.push(ValidationError::new(
                "retries.max_backoff_ms",
                "must not be smaller than initial_backoff_ms",
            ));
        }
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("expected one of {}", LOG_LEVELS.join(", ")),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Metrics collection.
//!
//! # Metrics
//! - `pipeline_requests_total` (counter): requests by outcome and status
//! - `pipeline_request_duration_seconds` (histogram): end-to-end latency
//! - `pipeline_rate_limited_total` (counter): admission denials
//! - `pipeline_retries_total` (counter): extra downstream attempts
//! - `pipeline_retries_exhausted_total` (counter): requests answered with 503
//! - `pipeline_in_flight` (gauge): held concurrency slots
//! - `pipeline_tracked_clients` (gauge): buckets in the rate limiter
//! - `pipeline_evicted_clients_total` (counter): janitor evictions
//!
//! No exporter is installed here; the embedding process chooses one.

use std::time::Instant;

use metrics::{counter, gauge, histogram};

pub fn record_request(outcome: &'static str, status: u16, start: Instant) {
    counter!(
        "pipeline_requests_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("pipeline_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("pipeline_rate_limited_total").increment(1);
}

pub fn record_retry(attempt: u32) {
    counter!("pipeline_retries_total", "attempt" => attempt.to_string()).increment(1);
}

pub fn record_retries_exhausted() {
    counter!("pipeline_retries_exhausted_total").increment(1);
}

pub fn record_in_flight(in_flight: usize) {
    gauge!("pipeline_in_flight").set(in_flight as f64);
}

pub fn record_tracked_clients(clients: usize) {
    gauge!("pipeline_tracked_clients").set(clients as f64);
}

pub fn record_evictions(evicted: usize) {
    counter!("pipeline_evicted_clients_total").increment(evicted as u64);
}

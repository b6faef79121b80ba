//! Demo handlers.
//!
//! `ping` and `process` run behind the pipeline; `health` is served directly
//! so probes are never rate limited or queued.

use axum::body::Bytes;

pub async fn ping() -> &'static str {
    "pong"
}

/// Echo the request body.
pub async fn process(body: Bytes) -> Bytes {
    tracing::debug!(len = body.len(), "Processing request body");
    body
}

pub async fn health() -> &'static str {
    "OK"
}

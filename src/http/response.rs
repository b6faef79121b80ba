//! Response construction and buffering.
//!
//! # Responsibilities
//! - Canned plain-text responses for every pipeline short-circuit
//! - Tag responses with the pipeline branch that produced them
//! - Capture a downstream response in memory so it can be discarded or
//!   forwarded as a whole
//!
//! # Design Decisions
//! - A failed attempt never touches the client: it lives only in a
//!   `BufferedResponse` until the retry loop picks a winner
//! - Captured headers and body are forwarded unchanged

use std::fmt;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode, Version};
use axum::response::{IntoResponse, Response};

/// Which branch of the pipeline answered a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Downstream answered with a non-server-error status.
    Served { attempts: u32 },
    /// Denied by the per-client rate limiter.
    RateLimited,
    /// Rejected by the concurrency gate (reject policy only).
    AtCapacity,
    /// Every attempt ended in a server error.
    RetriesExhausted { attempts: u32 },
    /// The request body could not be read.
    Malformed,
}

impl Outcome {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Served { attempts: 1 } => "admitted",
            Outcome::Served { .. } => "retried",
            Outcome::RateLimited => "denied",
            Outcome::AtCapacity => "at_capacity",
            Outcome::RetriesExhausted { .. } => "exhausted",
            Outcome::Malformed => "malformed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn tagged(status: StatusCode, body: &'static str, outcome: Outcome) -> Response {
    let mut response = (status, body).into_response();
    response.extensions_mut().insert(outcome);
    response
}

/// 429 for clients over their rate limit.
pub fn too_many_requests() -> Response {
    tagged(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests", Outcome::RateLimited)
}

/// 503 once every retry attempt has failed.
pub fn retries_exhausted(attempts: u32) -> Response {
    tagged(
        StatusCode::SERVICE_UNAVAILABLE,
        "Service temporarily unavailable",
        Outcome::RetriesExhausted { attempts },
    )
}

/// 503 when the gate rejects instead of waiting.
pub fn at_capacity() -> Response {
    tagged(StatusCode::SERVICE_UNAVAILABLE, "Server at capacity", Outcome::AtCapacity)
}

/// 400 when the request body cannot be read.
pub fn unreadable_body() -> Response {
    tagged(StatusCode::BAD_REQUEST, "Failed to read request body", Outcome::Malformed)
}

/// 413 when the declared body exceeds the buffering limit.
pub fn body_too_large() -> Response {
    tagged(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large", Outcome::Malformed)
}

/// A downstream response captured in memory.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BufferedResponse {
    /// Drain `response` into memory.
    pub async fn capture(response: Response) -> Result<Self, axum::Error> {
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await?;
        Ok(Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            body,
        })
    }

    /// Turn the captured response back into one that can be sent.
    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.version_mut() = self.version;
        *response.headers_mut() = self.headers;
        response
    }
}

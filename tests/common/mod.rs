//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use resilient_http::config::PipelineConfig;
use resilient_http::resilience::{ConcurrencyGate, GatePolicy, RetryPolicy};
use resilient_http::security::{ClientRateLimiter, RefillRate};
use resilient_http::{HttpServer, Pipeline, Shutdown};

pub const CLIENT_A: &str = "203.0.113.7";
pub const CLIENT_B: &str = "198.51.100.23";

/// Pipeline with a generous limiter, blocking gate and default retries.
pub fn pipeline(max_in_flight: usize) -> Pipeline {
    Pipeline::new(
        limiter(1_000, Duration::from_secs(300)),
        ConcurrencyGate::new(max_in_flight, GatePolicy::Block),
        RetryPolicy::default(),
        64 * 1024,
    )
}

/// Pipeline that never retries, for tests about admission only.
pub fn pipeline_without_retries(burst: u32, max_in_flight: usize) -> Pipeline {
    Pipeline::new(
        limiter(burst, Duration::from_secs(300)),
        ConcurrencyGate::new(max_in_flight, GatePolicy::Block),
        RetryPolicy::no_retries(),
        64 * 1024,
    )
}

/// Limiter refilling `burst` tokens per minute.
pub fn limiter(burst: u32, ttl: Duration) -> Arc<ClientRateLimiter> {
    Arc::new(ClientRateLimiter::new(
        burst,
        RefillRate::new(burst, Duration::from_secs(60)),
        ttl,
    ))
}

/// A GET request attributed to `client` via `X-Forwarded-For`.
pub fn request_from(client: &str) -> Request<Body> {
    Request::builder()
        .uri("/work")
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A running server on an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

pub async fn start_server(config: PipelineConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        base_url: format!("http://{addr}"),
        shutdown,
        handle,
    }
}

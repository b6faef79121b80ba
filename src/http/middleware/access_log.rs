//! Request logging interceptor.
//!
//! Emits "Request started" before the wrapped stage runs and
//! "Request finished" after it returns. Never alters the response; errors
//! and panics from the wrapped stage propagate unchanged. A request whose
//! future is dropped early (timeout, client gone, panic) is logged as
//! abandoned.

use std::task::{Context, Poll};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::http::{Method, Request};
use axum::response::Response;
use tower::{Layer, Service, ServiceExt};

use crate::http::middleware::BoxFuture;
use crate::http::request::request_id;
use crate::http::response::Outcome;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLogLayer;

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLog<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLog { inner }
    }
}

#[derive(Debug, Clone)]
pub struct AccessLog<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for AccessLog<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Response, S::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let mut entry = LogEntry {
            request_id: request_id(&request).unwrap_or("-").to_owned(),
            method: request.method().clone(),
            path: request.uri().path().to_owned(),
            start: Instant::now(),
            finished: false,
        };

        let started_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        tracing::info!(
            request_id = %entry.request_id,
            method = %entry.method,
            path = %entry.path,
            started_at_ms,
            "Request started"
        );

        let inner = self.inner.clone();
        Box::pin(async move {
            let result = inner.oneshot(request).await;
            entry.finish(&result);
            result
        })
    }
}

struct LogEntry {
    request_id: String,
    method: Method,
    path: String,
    start: Instant,
    finished: bool,
}

impl LogEntry {
    fn finish<E>(&mut self, result: &Result<Response, E>) {
        self.finished = true;
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let outcome = response
                    .extensions()
                    .get::<Outcome>()
                    .map(Outcome::label)
                    .unwrap_or("passthrough");
                tracing::info!(
                    request_id = %self.request_id,
                    method = %self.method,
                    path = %self.path,
                    status,
                    outcome,
                    elapsed_ms,
                    "Request finished"
                );
                metrics::record_request(outcome, status, self.start);
            }
            Err(_) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    method = %self.method,
                    path = %self.path,
                    elapsed_ms,
                    "Request failed"
                );
            }
        }
    }
}

impl Drop for LogEntry {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                request_id = %self.request_id,
                method = %self.method,
                path = %self.path,
                elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0,
                "Request abandoned before completion"
            );
        }
    }
}

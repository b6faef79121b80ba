//! Per-client rate limiting stage.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::Request;
use axum::response::Response;
use tower::{Layer, Service, ServiceExt};

use crate::http::middleware::BoxFuture;
use crate::http::response;
use crate::observability::metrics;
use crate::security::{client_key, ClientRateLimiter};

#[derive(Debug, Clone)]
pub struct RateLimitLayer {
    limiter: Arc<ClientRateLimiter>,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<ClientRateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimited<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimited {
            inner,
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Answers 429 without calling `inner` when the client is over its limit.
#[derive(Debug, Clone)]
pub struct RateLimited<S> {
    inner: S,
    limiter: Arc<ClientRateLimiter>,
}

impl<S, B> Service<Request<B>> for RateLimited<S>
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
        let key = client_key(&request);

        if !self.limiter.allow(&key) {
            tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
            metrics::record_rate_limited();
            return Box::pin(async { Ok(response::too_many_requests()) });
        }

        tracing::trace!(client = %key, "Rate limit check passed");
        let inner = self.inner.clone();
        Box::pin(inner.oneshot(request))
    }
}

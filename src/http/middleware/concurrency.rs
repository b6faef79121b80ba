//! Concurrency gate stage.

use std::task::{Context, Poll};

use axum::response::Response;
use tower::{Layer, Service, ServiceExt};

use crate::http::middleware::BoxFuture;
use crate::http::response;
use crate::resilience::ConcurrencyGate;

#[derive(Debug, Clone)]
pub struct ConcurrencyGateLayer {
    gate: ConcurrencyGate,
}

impl ConcurrencyGateLayer {
    pub fn new(gate: ConcurrencyGate) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for ConcurrencyGateLayer {
    type Service = Gated<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Gated {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Holds one gate slot for the whole duration of `inner`.
///
/// The slot is taken inside the response future, so a request that is
/// cancelled while waiting never owned one.
#[derive(Debug, Clone)]
pub struct Gated<S> {
    inner: S,
    gate: ConcurrencyGate,
}

impl<S, R> Service<R> for Gated<S>
where
    S: Service<R, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    R: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Response, S::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: R) -> Self::Future {
        let gate = self.gate.clone();
        let inner = self.inner.clone();
        Box::pin(async move {
            let slot = match gate.acquire().await {
                Ok(slot) => slot,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        capacity = gate.capacity(),
                        policy = ?gate.policy(),
                        "Concurrency gate refused request"
                    );
                    return Ok(response::at_capacity());
                }
            };
            tracing::debug!(
                in_flight = gate.in_flight(),
                capacity = gate.capacity(),
                "Concurrency slot acquired"
            );

            let result = inner.oneshot(request).await;
            drop(slot);
            result
        })
    }
}

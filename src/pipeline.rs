//! Pipeline composition.
//!
//! # Order
//! ```text
//! AccessLog → RateLimited → BufferBody → Gated → Retry → handler
//! ```
//!
//! - Rate limiting is cheapest and rejects before a slot is consumed
//! - The body is read before the gate so slow uploads cannot pin a slot
//! - The gate wraps the retry loop: every attempt of one admitted request
//!   shares the single slot acquired for it
//!
//! The composed service never fails (`Error = Infallible`), which lets it sit
//! directly behind an axum route via [`Pipeline::layer`].

use std::sync::Arc;

use tower::{Layer, ServiceBuilder};

use crate::config::PipelineConfig;
use crate::http::middleware::{
    AccessLog, AccessLogLayer, BufferBody, BufferBodyLayer, ConcurrencyGateLayer, Gated,
    RateLimitLayer, RateLimited, Retry, RetryLayer,
};
use crate::resilience::{ConcurrencyGate, RetryPolicy};
use crate::security::ClientRateLimiter;

/// A handler wrapped by every pipeline stage.
pub type Guarded<H> = AccessLog<RateLimited<BufferBody<Gated<Retry<H>>>>>;

/// Shared middleware state, composed in a fixed order around any handler.
#[derive(Debug, Clone)]
pub struct Pipeline {
    limiter: Arc<ClientRateLimiter>,
    gate: ConcurrencyGate,
    retry: RetryPolicy,
    max_body_bytes: usize,
}

impl Pipeline {
    pub fn new(
        limiter: Arc<ClientRateLimiter>,
        gate: ConcurrencyGate,
        retry: RetryPolicy,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            limiter,
            gate,
            retry,
            max_body_bytes,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            Arc::new(ClientRateLimiter::from_config(&config.rate_limit)),
            ConcurrencyGate::new(config.concurrency.max_in_flight, config.concurrency.policy),
            config.retries.policy(),
            config.limits.max_body_bytes,
        )
    }

    pub fn limiter(&self) -> &Arc<ClientRateLimiter> {
        &self.limiter
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Wrap `handler` with every stage.
    ///
    /// Services produced by repeated calls share the same limiter registry
    /// and gate.
    pub fn wrap<H>(&self, handler: H) -> Guarded<H> {
        ServiceBuilder::new()
            .layer(AccessLogLayer)
            .layer(RateLimitLayer::new(Arc::clone(&self.limiter)))
            .layer(BufferBodyLayer::new(self.max_body_bytes))
            .layer(ConcurrencyGateLayer::new(self.gate.clone()))
            .layer(RetryLayer::new(self.retry))
            .service(handler)
    }

    /// The pipeline as a Tower layer.
    pub fn layer(&self) -> PipelineLayer {
        PipelineLayer {
            pipeline: self.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineLayer {
    pipeline: Pipeline,
}

impl<H> Layer<H> for PipelineLayer {
    type Service = Guarded<H>;

    fn layer(&self, handler: H) -> Self::Service {
        self.pipeline.wrap(handler)
    }
}

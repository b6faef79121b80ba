//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the demo handlers
//! - Wrap the guarded routes in the pipeline via `route_layer`
//! - Wire up outer middleware (request timeout, request ID)
//! - Run the rate limiter janitor alongside the server
//! - Shut down gracefully on the broadcast signal

use std::net::SocketAddr;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;

use crate::config::PipelineConfig;
use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::pipeline::Pipeline;

/// HTTP server hosting the pipeline-guarded demo routes.
pub struct HttpServer {
    router: Router,
    config: PipelineConfig,
    pipeline: Pipeline,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: PipelineConfig) -> Self {
        let pipeline = Pipeline::from_config(&config);
        let router = Self::build_router(&config, &pipeline);
        Self {
            router,
            config,
            pipeline,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers added later run first: request ID is assigned before the
    /// timeout starts, and the pipeline sits inside both.
    #[allow(deprecated)]
    fn build_router(config: &PipelineConfig, pipeline: &Pipeline) -> Router {
        let mut router = Router::new()
            .route("/ping", get(handlers::ping))
            .route("/api/process", get(handlers::process).post(handlers::process))
            .route_layer(pipeline.layer())
            .route("/health", get(handlers::health));

        if config.timeouts.request_secs > 0 {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )));
        }

        router
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_in_flight = self.config.concurrency.max_in_flight,
            burst_size = self.config.rate_limit.burst_size,
            max_attempts = self.config.retries.max_attempts,
            "HTTP server starting"
        );

        let janitor = self
            .pipeline
            .limiter()
            .spawn_janitor(self.config.rate_limit.sweep_interval(), shutdown.resubscribe());

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        if let Err(e) = janitor.await {
            tracing::warn!(error = %e, "Janitor task ended abnormally");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, without connection info. Requests reaching it directly
    /// share the `unknown` client key unless they carry `X-Forwarded-For`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

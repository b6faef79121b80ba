//! Composable admission control and resilience for HTTP handlers.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod security;

pub use config::schema::PipelineConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{Guarded, Pipeline, PipelineLayer};

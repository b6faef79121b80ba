//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Whatever metrics recorder the embedding process installs
//! ```
//!
//! # Design Decisions
//! - Structured logging with named fields for machine parsing
//! - Request ID flows through every pipeline log event
//! - Metrics are cheap; without an installed recorder they are no-ops

pub mod logging;
pub mod metrics;

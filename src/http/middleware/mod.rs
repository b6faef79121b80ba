//! Pipeline stages as Tower middleware.
//!
//! # Data Flow
//! ```text
//! Request<Body>
//!     → access_log.rs   (request started / finished events)
//!     → rate_limit.rs   (per-client token bucket; 429 on denial)
//!     → body.rs         (buffer body once; 400/413 on bad input)
//!     → concurrency.rs  (hold one gate slot for the rest of the chain)
//!     → retry.rs        (attempt into a buffer, back off on 5xx, 503 when exhausted)
//!     → downstream handler
//! ```
//!
//! # Design Decisions
//! - Each stage clones its inner service per call and drives readiness on
//!   the clone, so stages are cheap to share across connections
//! - Stages never fail on their own: short-circuits are ordinary responses
//!   tagged with an `Outcome` extension

use std::future::Future;
use std::pin::Pin;

pub mod access_log;
pub mod body;
pub mod concurrency;
pub mod rate_limit;
pub mod retry;

pub use access_log::{AccessLog, AccessLogLayer};
pub use body::{BufferBody, BufferBodyLayer};
pub use concurrency::{ConcurrencyGateLayer, Gated};
pub use rate_limit::{RateLimitLayer, RateLimited};
pub use retry::{Retry, RetryLayer};

/// Boxed future returned by every stage.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

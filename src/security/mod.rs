//! Security subsystem: admission by client.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_key.rs (X-Forwarded-For or peer address)
//!     → rate_limit.rs (look up / lazily create the client's bucket)
//!     → token_bucket.rs (refill, spend one token)
//!     → admitted: continue to the concurrency gate
//!     → denied: 429, downstream never invoked
//!
//! Background:
//!     janitor task → rate_limit.rs sweep (evict idle clients)
//! ```
//!
//! # Design Decisions
//! - Rate limiting is the cheapest check and runs before any slot is taken
//! - One lock for the registry; never held across an await
//! - Limiter state is in-process only and lost on restart

pub mod client_key;
pub mod rate_limit;
pub mod token_bucket;

pub use client_key::client_key;
pub use rate_limit::ClientRateLimiter;
pub use token_bucket::{RefillRate, TokenBucket};

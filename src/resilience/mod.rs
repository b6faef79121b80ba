//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted request:
//!     → concurrency.rs (take one slot; wait or reject when saturated)
//!     → retries.rs (attempt, classify status, maybe try again)
//!     → backoff.rs (delay between attempts)
//!     → slot released when the response (or cancellation) leaves the gate
//! ```
//!
//! # Design Decisions
//! - The gate wraps the retry loop: all attempts of one request share its slot
//! - Backoff sleeps hold the slot, which throttles retry storms
//! - All resilience logic is composable middleware (see `http::middleware`)

pub mod backoff;
pub mod concurrency;
pub mod retries;

pub use backoff::BackoffPolicy;
pub use concurrency::{ConcurrencyGate, GateError, GatePolicy, GateSlot};
pub use retries::RetryPolicy;

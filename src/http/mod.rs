//! HTTP surface subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, timeout, request ID)
//!     → pipeline (middleware/ stages, see crate::pipeline)
//!     → handlers.rs
//!     → response.rs (canned responses, buffered attempts)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::Outcome;
pub use server::HttpServer;

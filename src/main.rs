//! resilient-http demo server
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id → timeout
//!                         │
//!                         ▼
//!                  ┌──────────────┐   /health (unguarded)
//!                  │  access log  │
//!                  ├──────────────┤
//!                  │  rate limit  │──▶ 429
//!                  ├──────────────┤
//!                  │ body buffer  │──▶ 400 / 413
//!                  ├──────────────┤
//!                  │     gate     │
//!                  ├──────────────┤
//!                  │    retry     │──▶ 503 when exhausted
//!                  └──────┬───────┘
//!                         ▼
//!                  /ping, /api/process
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use resilient_http::config::{load_config, PipelineConfig};
use resilient_http::lifecycle::wait_for_signal;
use resilient_http::observability::logging::init_tracing;
use resilient_http::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "resilient-http")]
#[command(about = "HTTP server with rate limiting, a concurrency gate and retries", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    init_tracing(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "resilient-http starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_in_flight = config.concurrency.max_in_flight,
        gate_policy = ?config.concurrency.policy,
        burst_size = config.rate_limit.burst_size,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    HttpServer::new(config).run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

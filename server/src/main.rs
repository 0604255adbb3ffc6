//! EventHub Server - Main entry point.
//!
//! This binary starts the EventHub API server with:
//! - Structured JSON logging
//! - Graceful shutdown on SIGTERM/SIGINT
//! - Background cleanup of idle login throttle buckets
//!
//! # Configuration
//!
//! See [`eventhub_server::config`] for environment variable configuration.
//!
//! # Example
//!
//! ```bash
//! EVENTHUB_SIGNING_SECRET="$(openssl rand -hex 32)" \
//! EVENTHUB_USERS="alice:ORGANIZER:$(printf 'hunter2' | argon2 "$(openssl rand -hex 8)" -id -e)" \
//! PORT=8080 \
//! cargo run --release --bin eventhub-server
//! ```

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use eventhub_server::config::Config;
use eventhub_server::routes::{create_router, AppState};

/// Cleanup interval for idle login throttle buckets (30 seconds).
const THROTTLE_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load configuration");
            print_usage(&err.to_string());
            return ExitCode::from(1);
        }
    };

    match run(config).await {
        Ok(()) => {
            info!("Server shutdown complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "Server error");
            ExitCode::from(1)
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!(
        port = config.port,
        key_id = %config.signing_key.key_id(),
        ttl_secs = config.token_ttl.as_secs(),
        user_count = config.directory.len(),
        "EventHub server starting"
    );

    let port = config.port;
    let state = AppState::new(config);

    let cleanup_handle = state.throttle.spawn_cleanup_task(THROTTLE_CLEANUP_INTERVAL);
    info!(
        interval_secs = THROTTLE_CLEANUP_INTERVAL.as_secs(),
        "Login throttle cleanup task started"
    );

    let app = create_router(state);

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {bind_addr}"))?;
    info!(address = %bind_addr, "Server listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly");

    cleanup_handle.abort();
    info!("Login throttle cleanup task stopped");

    result
}

fn print_usage(message: &str) {
    eprintln!("Error: {message}");
    eprintln!();
    eprintln!("Required environment variables:");
    eprintln!("  EVENTHUB_SIGNING_SECRET  - HMAC signing secret, at least 32 bytes");
    eprintln!();
    eprintln!("Optional environment variables:");
    eprintln!("  EVENTHUB_TOKEN_TTL_SECS  - Credential lifetime in seconds (default: 3600)");
    eprintln!("  EVENTHUB_USERS           - Format: id:ROLE:argon2-phc;id:ROLE:argon2-phc");
    eprintln!("  EVENTHUB_LOGIN_RATE      - Login attempts refilled per second (default: 0.2)");
    eprintln!("  EVENTHUB_LOGIN_BURST     - Login attempts per burst (default: 5)");
    eprintln!("  PORT                     - HTTP server port (default: 8080)");
    eprintln!("  RUST_LOG                 - Log level filter (default: info)");
}

/// Initialize structured logging with tracing.
///
/// JSON output, filtered by `RUST_LOG` with a default of `info`.
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let json_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .init();
}

/// Resolves when SIGTERM or SIGINT is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

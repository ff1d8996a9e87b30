//! Promtrail Service
//!
//! This crate runs the enabled query definitions on a fixed interval and
//! exposes a small HTTP surface for operators.
//!
//! # Architecture
//!
//! The service is built on Axum and Tokio, providing:
//! - A periodic [`runner::QueryRunner`] driving the shared executor
//! - Health and readiness endpoints
//! - Manual query runs and time expression previews
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
pub mod db;
mod routes;
pub mod runner;
mod state;

pub use config::{Config, LogFormat, DEFAULT_RUN_INTERVAL};
pub use state::AppState;

use anyhow::{Context, Result};
use axum::Router;
use db::{Database, DatabaseConfig};
use runner::QueryRunner;
use shared::executor::QueryExecutor;
use shared::source::{PrometheusClient, PrometheusConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Initializes the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

/// Runs the promtrail service.
///
/// This function initializes the service with configuration from environment
/// variables, prepares the database schema, and starts the runner and the HTTP
/// server. It handles graceful shutdown on SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The Prometheus client cannot be built
/// - The database schema cannot be created
/// - The server fails to bind to the configured address
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    let database = Database::new(&DatabaseConfig::from_env());
    database.ensure_schema().await?;

    let source = PrometheusClient::new(&PrometheusConfig::from_env())
        .context("Failed to create Prometheus client")?;
    tracing::info!(url = %source.base_url(), "Using Prometheus source");

    let executor = QueryExecutor::new(std::sync::Arc::new(source), database.record_store())
        .with_options(config.executor_options());
    let state = AppState::new(executor, database.config_provider(), config.timezone);

    run_server_with_config(config, state).await
}

/// Runs the service with the provided configuration and state.
///
/// This is useful for testing or when you want to provide configuration programmatically.
///
/// # Errors
///
/// Returns an error if:
/// - The run interval is zero
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config, state: AppState) -> Result<()> {
    let addr = config.socket_addr()?;
    let shutdown = CancellationToken::new();
    let state = state.with_shutdown(shutdown.clone());

    tracing::info!(
        host = %config.host,
        port = %config.port,
        timezone = %config.timezone,
        plan_mode = %config.plan_mode,
        "Promtrail service starting"
    );

    let runner = QueryRunner::new(state.clone(), config.run_interval)?;
    let runner_handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { runner.run(shutdown).await }
    });

    let app = create_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(%addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                shutdown_signal().await;
                shutdown.cancel();
            }
        })
        .await?;

    shutdown.cancel();
    runner_handle.await.context("Query runner task failed")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::ready_routes(state.clone()))
        .merge(routes::queries_routes(state.clone()))
        .merge(routes::resolve_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

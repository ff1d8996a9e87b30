//! Promtrail Service Binary
//!
//! Entry point for the promtrail query runner and HTTP server.

#![deny(unsafe_code)]

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let format = std::env::var("PROMTRAIL_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<api::LogFormat>().ok())
        .unwrap_or_default();
    api::init_tracing(format);

    api::run_server().await
}

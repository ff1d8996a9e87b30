//! Periodic query runner.
//!
//! Every run interval the runner captures one reference instant, lists the
//! enabled query definitions and executes them one after another.

use crate::state::AppState;
use shared::models::{ExecutionRecord, ExecutionStatus};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Runs the enabled query definitions on a fixed interval.
#[derive(Clone)]
pub struct QueryRunner {
    state: AppState,
    interval: Duration,
}

impl QueryRunner {
    /// Creates a runner.
    ///
    /// # Errors
    ///
    /// Returns an error if `interval` is zero.
    pub fn new(state: AppState, interval: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(!interval.is_zero(), "Run interval must be positive");
        Ok(Self { state, interval })
    }

    /// Runs until `shutdown` is cancelled. The first run starts immediately.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX);
        tracing::info!(interval_ms, "Query runner started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::debug!("Query runner received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_once(&shutdown).await;
                }
            }
        }

        tracing::info!("Query runner stopped");
    }

    /// Executes every enabled definition once against one reference instant.
    ///
    /// Returns the execution records in definition order. Stops early when
    /// `cancel` fires.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Vec<ExecutionRecord> {
        let definitions = match self.state.provider().list_enabled_query_definitions().await {
            Ok(definitions) => definitions,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load query definitions");
                return Vec::new();
            }
        };

        let reference = self.state.capture_reference();
        tracing::info!(
            queries = definitions.len(),
            reference = %reference.local().to_rfc3339(),
            "Starting scheduled run"
        );

        let mut records = Vec::with_capacity(definitions.len());
        for definition in &definitions {
            if cancel.is_cancelled() {
                tracing::info!("Scheduled run cancelled");
                break;
            }
            records.push(
                self.state
                    .executor()
                    .run_query(definition, &reference, cancel)
                    .await,
            );
        }

        let failed = records
            .iter()
            .filter(|r| r.status == ExecutionStatus::Failed)
            .count();
        tracing::info!(executed = records.len(), failed, "Scheduled run complete");

        records
    }
}

//! Retrying query executor.
//!
//! `QueryExecutor::run_query` drives one invocation through
//! plan → fetch → normalize → persist, retrying up to `retry_count` times,
//! and writes exactly one [`ExecutionRecord`] when it reaches a terminal
//! state.

use crate::models::{ExecutionRecord, QueryDefinition};
use crate::normalize::normalize_result;
use crate::planner::{PlanError, PlanMode, QueryPlanner};
use crate::source::{MetricsSource, SourceError};
use crate::storage::{RecordStore, StoreError};
use crate::timeexpr::ReferenceInstant;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Executor settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// How unknown range types are planned.
    pub plan_mode: PlanMode,
    /// Stop on the first plan error instead of retrying it.
    pub fail_fast_on_plan_errors: bool,
}

impl ExecutorOptions {
    /// Sets the plan mode.
    #[must_use]
    pub fn with_plan_mode(mut self, plan_mode: PlanMode) -> Self {
        self.plan_mode = plan_mode;
        self
    }

    /// Sets fail-fast on plan errors.
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast_on_plan_errors = fail_fast;
        self
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptError {
    /// Planning failed.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// The metrics source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Persisting the samples failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Samples were returned but none could be normalized.
    #[error("All {skipped} returned samples were malformed")]
    NoValidSamples {
        /// Number of skipped samples.
        skipped: usize,
    },
}

/// Terminal failure of an execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// Every attempt failed.
    #[error("Query failed after {attempts} attempt(s): {source}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error of the last attempt.
        #[source]
        source: AttemptError,
    },

    /// The cancellation token fired.
    #[error("Execution cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Attempts made before cancellation.
        attempts: u32,
    },
}

/// Failure of a preflight check.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreflightError {
    /// The metrics source is unreachable.
    #[error("Metrics source check failed: {0}")]
    Source(#[from] SourceError),

    /// The record store is unreachable.
    #[error("Record store check failed: {0}")]
    Store(#[from] StoreError),
}

/// Runs query definitions against a metrics source and persists the results.
///
/// # Example
///
/// ```
/// use chrono::FixedOffset;
/// use shared::executor::QueryExecutor;
/// use shared::models::{ExecutionStatus, QueryDefinition};
/// use shared::source::StaticMetricsSource;
/// use shared::storage::InMemoryRecordStore;
/// use shared::timeexpr::ReferenceInstant;
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let store = InMemoryRecordStore::new_shared();
/// let executor = QueryExecutor::new(StaticMetricsSource::new_shared(), store.clone());
/// let reference = ReferenceInstant::capture(FixedOffset::east_opt(0).unwrap());
///
/// let record = executor
///     .run_query(&QueryDefinition::new("up", "up"), &reference, &CancellationToken::new())
///     .await;
///
/// assert_eq!(record.status, ExecutionStatus::Success);
/// assert_eq!(store.executions().unwrap().len(), 1);
/// # });
/// ```
#[derive(Clone)]
pub struct QueryExecutor {
    source: Arc<dyn MetricsSource>,
    store: Arc<dyn RecordStore>,
    options: ExecutorOptions,
}

impl QueryExecutor {
    /// Creates an executor with default options.
    #[must_use]
    pub fn new(source: Arc<dyn MetricsSource>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            source,
            store,
            options: ExecutorOptions::default(),
        }
    }

    /// Sets the options.
    #[must_use]
    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    /// The executor's options.
    #[must_use]
    pub fn options(&self) -> ExecutorOptions {
        self.options
    }

    /// The metrics source.
    #[must_use]
    pub fn source(&self) -> Arc<dyn MetricsSource> {
        Arc::clone(&self.source)
    }

    /// Runs one query to a terminal state and records the outcome.
    ///
    /// Always returns the terminal record, which is also written to the
    /// store exactly once. A failure to write it is logged and does not
    /// change the returned record.
    pub async fn run_query(
        &self,
        definition: &QueryDefinition,
        reference: &ReferenceInstant,
        cancel: &CancellationToken,
    ) -> ExecutionRecord {
        let started = Instant::now();
        let record = ExecutionRecord::start(&definition.id, &definition.name, Utc::now());

        tracing::info!(query_id = %definition.id, query_name = %definition.name, "Starting query execution");

        let (outcome, attempts) = self.attempt_loop(definition, reference, cancel).await;
        let elapsed = started.elapsed();
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        let record = match outcome {
            Ok(records) => {
                tracing::info!(
                    query_id = %definition.id,
                    records,
                    attempts,
                    duration_ms,
                    "Query execution succeeded"
                );
                record.succeed(elapsed, attempts, records)
            }
            Err(e) => {
                tracing::error!(
                    query_id = %definition.id,
                    attempts,
                    duration_ms,
                    error = %e,
                    "Query execution failed"
                );
                record.fail(elapsed, attempts, e.to_string())
            }
        };

        if let Err(e) = self.store.insert_execution_record(&record).await {
            tracing::error!(
                query_id = %definition.id,
                error = %e,
                "Failed to write execution record"
            );
        }

        record
    }

    async fn attempt_loop(
        &self,
        definition: &QueryDefinition,
        reference: &ReferenceInstant,
        cancel: &CancellationToken,
    ) -> (Result<u64, ExecutionError>, u32) {
        let max_attempts = definition.max_attempts();
        let retry_interval = definition.retry_interval_duration();
        let mut attempts = 0;

        loop {
            if cancel.is_cancelled() {
                return (Err(ExecutionError::Cancelled { attempts }), attempts);
            }

            attempts += 1;
            let error = match self.attempt(definition, reference).await {
                Ok(records) => return (Ok(records), attempts),
                Err(e) => e,
            };

            let fail_fast =
                self.options.fail_fast_on_plan_errors && matches!(error, AttemptError::Plan(_));
            if attempts >= max_attempts || fail_fast {
                return (
                    Err(ExecutionError::Exhausted {
                        attempts,
                        source: error,
                    }),
                    attempts,
                );
            }

            tracing::info!(
                query_id = %definition.id,
                attempt = attempts,
                max_attempts,
                retry_interval_ms = u64::try_from(retry_interval.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Attempt failed, retrying"
            );

            tokio::select! {
                () = cancel.cancelled() => {
                    return (Err(ExecutionError::Cancelled { attempts }), attempts);
                }
                () = tokio::time::sleep(retry_interval) => {}
            }
        }
    }

    async fn attempt(
        &self,
        definition: &QueryDefinition,
        reference: &ReferenceInstant,
    ) -> Result<u64, AttemptError> {
        let request = QueryPlanner::new(self.options.plan_mode).plan(definition, reference)?;
        tracing::debug!(query_id = %definition.id, request = %request, "Planned query");

        let result = self.source.fetch(&request).await?;
        let batch = normalize_result(&result, &definition.id, Utc::now());
        if batch.all_skipped() {
            return Err(AttemptError::NoValidSamples {
                skipped: batch.skipped,
            });
        }

        self.store.insert_normalized_records(&batch.records).await?;
        Ok(batch.records.len() as u64)
    }

    /// Checks the source, then the store. Not retried.
    ///
    /// # Errors
    ///
    /// Returns the first failure encountered.
    pub async fn preflight(&self) -> Result<(), PreflightError> {
        self.source.ping().await?;
        self.store.ping().await?;
        Ok(())
    }
}

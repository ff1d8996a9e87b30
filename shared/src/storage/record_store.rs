//! Persistence of execution records and normalized samples.
//!
//! Provides the `RecordStore` trait, an `InMemoryRecordStore` for development
//! and testing, and a `ClickHouseRecordStore` for production use.

use crate::models::{ExecutionRecord, NormalizedRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Table holding execution records.
pub const EXECUTIONS_TABLE: &str = "query_executions";

/// Table holding normalized samples.
pub const METRIC_RECORDS_TABLE: &str = "metric_records";

/// Errors that can occur during record store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A write failed.
    #[error("Failed to write to store: {0}")]
    Write(String),

    /// The store cannot be reached.
    #[error("Store connection failed: {0}")]
    Connection(String),
}

/// Trait for record store implementations.
///
/// Implementations must tolerate concurrent calls from independent
/// executions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persists one execution record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn insert_execution_record(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    /// Persists a batch of normalized records. An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn insert_normalized_records(&self, records: &[NormalizedRecord])
        -> Result<(), StoreError>;

    /// Checks that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if it is not.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// In-memory record store implementation.
///
/// Failures can be scripted to exercise retry paths.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    executions: Arc<RwLock<Vec<ExecutionRecord>>>,
    records: Arc<RwLock<Vec<NormalizedRecord>>>,
    failing_batches: AtomicUsize,
    failing_executions: AtomicBool,
    unreachable: AtomicBool,
}

impl InMemoryRecordStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory store wrapped in an Arc.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Makes the next `count` batch inserts fail.
    pub fn fail_next_batches(&self, count: usize) {
        self.failing_batches.store(count, Ordering::SeqCst);
    }

    /// Makes every execution record insert fail.
    pub fn set_execution_writes_failing(&self, failing: bool) {
        self.failing_executions.store(failing, Ordering::SeqCst);
    }

    /// Makes `ping` fail.
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Execution records written so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn executions(&self) -> Result<Vec<ExecutionRecord>, StoreError> {
        self.executions
            .read()
            .map(|records| records.clone())
            .map_err(|_| lock_error())
    }

    /// Normalized records written so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn records(&self) -> Result<Vec<NormalizedRecord>, StoreError> {
        self.records
            .read()
            .map(|records| records.clone())
            .map_err(|_| lock_error())
    }

    /// Number of normalized records written so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn record_count(&self) -> Result<usize, StoreError> {
        self.records
            .read()
            .map(|records| records.len())
            .map_err(|_| lock_error())
    }
}

fn lock_error() -> StoreError {
    StoreError::Write("Failed to acquire lock on record store".to_string())
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert_execution_record(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        if self.failing_executions.load(Ordering::SeqCst) {
            return Err(StoreError::Write("Execution record rejected".to_string()));
        }

        self.executions
            .write()
            .map_err(|_| lock_error())?
            .push(record.clone());
        Ok(())
    }

    async fn insert_normalized_records(
        &self,
        records: &[NormalizedRecord],
    ) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let failing = self
            .failing_batches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Write("Batch rejected".to_string()));
        }

        self.records
            .write()
            .map_err(|_| lock_error())?
            .extend_from_slice(records);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("Store unreachable".to_string()));
        }
        Ok(())
    }
}

/// `ClickHouse`-backed record store implementation.
#[derive(Clone)]
pub struct ClickHouseRecordStore {
    client: Arc<clickhouse::Client>,
}

#[derive(clickhouse::Row, serde::Serialize)]
struct ExecutionRow {
    query_id: String,
    query_name: String,
    status: String,
    start_time: i64,
    end_time: Option<i64>,
    duration_ms: Option<u64>,
    records_count: u64,
    attempts: u32,
    error_message: Option<String>,
}

#[derive(clickhouse::Row, serde::Serialize)]
struct MetricRecordRow {
    query_id: String,
    metric_name: String,
    labels: HashMap<String, String>,
    value: f64,
    timestamp: i64,
    collected_at: i64,
    result_type: String,
}

fn millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

impl ClickHouseRecordStore {
    /// Creates a new `ClickHouse` record store with the given client.
    #[must_use]
    pub fn new(client: Arc<clickhouse::Client>) -> Self {
        Self { client }
    }

    /// Creates a new `ClickHouse` record store wrapped in an Arc.
    #[must_use]
    pub fn new_shared(client: Arc<clickhouse::Client>) -> Arc<Self> {
        Arc::new(Self::new(client))
    }

    /// Creates the record tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if a statement fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let statements = [
            format!(
                "CREATE TABLE IF NOT EXISTS {EXECUTIONS_TABLE} (
                    query_id String,
                    query_name String,
                    status LowCardinality(String),
                    start_time DateTime64(3),
                    end_time Nullable(DateTime64(3)),
                    duration_ms Nullable(UInt64),
                    records_count UInt64,
                    attempts UInt32,
                    error_message Nullable(String)
                ) ENGINE = MergeTree()
                ORDER BY (query_id, start_time)"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {METRIC_RECORDS_TABLE} (
                    query_id String,
                    metric_name LowCardinality(String),
                    labels Map(String, String),
                    value Float64,
                    timestamp DateTime64(3),
                    collected_at DateTime64(3),
                    result_type LowCardinality(String)
                ) ENGINE = MergeTree()
                ORDER BY (query_id, metric_name, timestamp)"
            ),
        ];

        for statement in &statements {
            self.client
                .query(statement)
                .execute()
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;
        }

        tracing::info!("Record store schema ready");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for ClickHouseRecordStore {
    async fn insert_execution_record(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let row = ExecutionRow {
            query_id: record.query_id.clone(),
            query_name: record.query_name.clone(),
            status: record.status.to_string(),
            start_time: millis(record.start_time),
            end_time: record.end_time().map(millis),
            duration_ms: record.completion.map(|c| c.duration_ms),
            records_count: record.records_count,
            attempts: record.attempts,
            error_message: record.error_message.clone(),
        };

        let write = async {
            let mut insert = self.client.insert::<ExecutionRow>(EXECUTIONS_TABLE).await?;
            insert.write(&row).await?;
            insert.end().await
        };

        write.await.map_err(|e| StoreError::Write(e.to_string()))
    }

    async fn insert_normalized_records(
        &self,
        records: &[NormalizedRecord],
    ) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let write = async {
            let mut insert = self
                .client
                .insert::<MetricRecordRow>(METRIC_RECORDS_TABLE)
                .await?;

            for record in records {
                let row = MetricRecordRow {
                    query_id: record.query_id.clone(),
                    metric_name: record.metric_name.clone(),
                    labels: record.labels.clone(),
                    value: record.value(),
                    timestamp: millis(record.timestamp),
                    collected_at: millis(record.collected_at),
                    result_type: record.result_type.to_string(),
                };
                insert.write(&row).await?;
            }

            insert.end().await
        };

        write.await.map_err(|e| StoreError::Write(e.to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}

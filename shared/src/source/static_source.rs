//! In-process metrics source serving scripted responses.
//!
//! Useful for development without a running Prometheus and for tests that
//! need to script failures.

use super::{decode_query_response, MetricsSource, SourceError};
use crate::models::{QueryResult, SourceResponse};
use crate::planner::SourceRequest;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// A metrics source that replays a queue of scripted outcomes.
///
/// Each query pops the next outcome; once the queue is empty, queries
/// succeed with an empty result. Every request is recorded.
#[derive(Debug)]
pub struct StaticMetricsSource {
    outcomes: Mutex<VecDeque<Result<QueryResult, SourceError>>>,
    requests: RwLock<Vec<SourceRequest>>,
    metric_names: Vec<String>,
    reachable: AtomicBool,
}

impl Default for StaticMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticMetricsSource {
    /// Creates a reachable source with no scripted outcomes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            requests: RwLock::new(Vec::new()),
            metric_names: Vec::new(),
            reachable: AtomicBool::new(true),
        }
    }

    /// Creates a new source wrapped in an Arc.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Queues a successful result.
    #[must_use]
    pub fn with_result(self, result: QueryResult) -> Self {
        self.push(Ok(result));
        self
    }

    /// Queues a failure.
    #[must_use]
    pub fn with_failure(self, error: SourceError) -> Self {
        self.push(Err(error));
        self
    }

    /// Queues the outcome of decoding a raw response envelope.
    #[must_use]
    pub fn with_response(self, response: SourceResponse) -> Self {
        self.push(decode_query_response(response));
        self
    }

    /// Sets the names returned by `list_metric_names`.
    #[must_use]
    pub fn with_metric_names(mut self, names: Vec<String>) -> Self {
        self.metric_names = names;
        self
    }

    /// Queues an outcome.
    pub fn push(&self, outcome: Result<QueryResult, SourceError>) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push_back(outcome);
        }
    }

    /// Makes `ping` and every query fail with a transport error.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<SourceRequest> {
        self.requests
            .read()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Number of queries received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.read().map(|r| r.len()).unwrap_or_default()
    }

    fn check_reachable(&self) -> Result<(), SourceError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SourceError::Transport("Metrics source unreachable".to_string()))
        }
    }

    fn answer(&self, request: SourceRequest) -> Result<QueryResult, SourceError> {
        let kind = request.result_kind();
        self.requests
            .write()
            .map_err(|e| SourceError::Transport(format!("Failed to acquire lock: {e}")))?
            .push(request);
        self.check_reachable()?;

        let next = self
            .outcomes
            .lock()
            .map_err(|e| SourceError::Transport(format!("Failed to acquire lock: {e}")))?
            .pop_front();

        next.unwrap_or_else(|| {
            Ok(match kind {
                crate::models::ResultKind::Instant => QueryResult::Vector(Vec::new()),
                crate::models::ResultKind::Range => QueryResult::Matrix(Vec::new()),
            })
        })
    }
}

#[async_trait]
impl MetricsSource for StaticMetricsSource {
    async fn query_instant(
        &self,
        query: &str,
        time: DateTime<FixedOffset>,
    ) -> Result<QueryResult, SourceError> {
        self.answer(SourceRequest::Instant {
            query: query.to_string(),
            time,
        })
    }

    async fn query_range(
        &self,
        query: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        step: Duration,
    ) -> Result<QueryResult, SourceError> {
        self.answer(SourceRequest::Range {
            query: query.to_string(),
            start,
            end,
            step,
        })
    }

    async fn list_metric_names(&self) -> Result<Vec<String>, SourceError> {
        self.check_reachable()?;
        Ok(self.metric_names.clone())
    }

    async fn ping(&self) -> Result<(), SourceError> {
        self.check_reachable()
    }
}

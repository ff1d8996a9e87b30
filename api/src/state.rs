//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers and
//! to the query runner.

use chrono::{FixedOffset, Offset, Utc};
use shared::executor::QueryExecutor;
use shared::source::StaticMetricsSource;
use shared::storage::{ConfigProvider, InMemoryConfigProvider, InMemoryRecordStore};
use shared::timeexpr::ReferenceInstant;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    executor: QueryExecutor,
    provider: Arc<dyn ConfigProvider>,
    timezone: FixedOffset,
    shutdown: CancellationToken,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        executor: QueryExecutor,
        provider: Arc<dyn ConfigProvider>,
        timezone: FixedOffset,
    ) -> Self {
        Self {
            executor,
            provider,
            timezone,
            shutdown: CancellationToken::new(),
        }
    }

    /// Creates a state backed by a static source and in-memory stores.
    ///
    /// This is useful for development and testing.
    #[must_use]
    pub fn with_in_memory_store() -> Self {
        Self::new(
            QueryExecutor::new(
                StaticMetricsSource::new_shared(),
                InMemoryRecordStore::new_shared(),
            ),
            Arc::new(InMemoryConfigProvider::new()),
            Utc.fix(),
        )
    }

    /// Replaces the shutdown token.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Returns the executor.
    #[must_use]
    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Returns the query definition provider.
    #[must_use]
    pub fn provider(&self) -> &dyn ConfigProvider {
        self.provider.as_ref()
    }

    /// Returns the zone used for day boundaries.
    #[must_use]
    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    /// Returns the token cancelled on shutdown.
    #[must_use]
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Captures a reference instant in the configured zone.
    #[must_use]
    pub fn capture_reference(&self) -> ReferenceInstant {
        ReferenceInstant::capture(self.timezone)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_in_memory_store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::QueryDefinition;

    #[tokio::test]
    async fn test_app_state_with_in_memory_store() {
        let state = AppState::with_in_memory_store();

        assert!(state.executor().preflight().await.is_ok());
        assert!(state
            .provider()
            .list_enabled_query_definitions()
            .await
            .unwrap()
            .is_empty());
        assert_eq!(state.capture_reference().zone(), state.timezone());
    }

    #[tokio::test]
    async fn test_app_state_is_clone() {
        let provider = Arc::new(InMemoryConfigProvider::new());
        let state = AppState::new(
            QueryExecutor::new(
                StaticMetricsSource::new_shared(),
                InMemoryRecordStore::new_shared(),
            ),
            provider.clone(),
            FixedOffset::east_opt(3600).unwrap(),
        );
        let state2 = state.clone();

        provider.upsert(QueryDefinition::new("q1", "up")).unwrap();

        let definitions = state2.provider().list_enabled_query_definitions().await.unwrap();
        assert_eq!(definitions.len(), 1);
        assert!(!state2.shutdown().is_cancelled());
    }
}

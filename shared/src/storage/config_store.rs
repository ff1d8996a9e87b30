//! Query definition providers.
//!
//! The `ConfigProvider` trait lists the enabled query definitions, ordered by
//! creation time, and manages them: save (insert or replace), delete and
//! enable/disable. Replacing a definition keeps its creation time, so the
//! listing order is stable across edits. `InMemoryConfigProvider` keeps them
//! in memory (optionally loaded from JSON); `ClickHouseConfigProvider` uses
//! the `query_configs` table.

use crate::config::ConfigError;
use crate::models::{QueryDefinition, TimeRangeConfig};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, RwLock};

/// Table holding query definitions.
pub const QUERY_CONFIGS_TABLE: &str = "query_configs";

/// Trait for query definition providers.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Enabled definitions, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the definitions cannot be loaded.
    async fn list_enabled_query_definitions(&self) -> Result<Vec<QueryDefinition>, ConfigError>;

    /// Looks up one definition by id, enabled or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the definitions cannot be loaded.
    async fn get_query_definition(&self, id: &str) -> Result<Option<QueryDefinition>, ConfigError>;

    /// Inserts a definition, or replaces the one with the same id while
    /// keeping its creation time.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDefinition` if validation fails and `Store` if the
    /// write fails.
    async fn save_query_definition(&self, definition: QueryDefinition) -> Result<(), ConfigError>;

    /// Removes a definition.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no definition has this id.
    async fn delete_query_definition(&self, id: &str) -> Result<(), ConfigError>;

    /// Enables or disables a definition and returns the updated definition.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no definition has this id.
    async fn set_query_enabled(
        &self,
        id: &str,
        enabled: bool,
    ) -> Result<QueryDefinition, ConfigError>;
}

fn check_definition(definition: &QueryDefinition) -> Result<(), ConfigError> {
    definition
        .validate_definition()
        .map_err(|e| ConfigError::InvalidDefinition {
            id: definition.id.clone(),
            reason: e.to_string(),
        })
}

/// In-memory provider. Insertion order is creation order.
#[derive(Debug, Default)]
pub struct InMemoryConfigProvider {
    definitions: Arc<RwLock<Vec<QueryDefinition>>>,
}

impl InMemoryConfigProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider holding `definitions`.
    #[must_use]
    pub fn with_definitions(definitions: Vec<QueryDefinition>) -> Self {
        Self {
            definitions: Arc::new(RwLock::new(definitions)),
        }
    }

    /// Loads definitions from a JSON array.
    ///
    /// # Errors
    ///
    /// Returns `Load` if the JSON cannot be parsed and `InvalidDefinition`
    /// if a definition fails validation.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let definitions: Vec<QueryDefinition> =
            serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))?;

        for definition in &definitions {
            check_definition(definition)?;
        }

        Ok(Self::with_definitions(definitions))
    }

    /// Inserts a definition, replacing any with the same id in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn upsert(&self, definition: QueryDefinition) -> Result<(), ConfigError> {
        let mut definitions = self.definitions.write().map_err(|_| lock_error())?;
        match definitions.iter_mut().find(|d| d.id == definition.id) {
            Some(existing) => *existing = definition,
            None => definitions.push(definition),
        }
        Ok(())
    }
}

fn lock_error() -> ConfigError {
    ConfigError::Load("Failed to acquire lock on query definitions".to_string())
}

#[async_trait]
impl ConfigProvider for InMemoryConfigProvider {
    async fn list_enabled_query_definitions(&self) -> Result<Vec<QueryDefinition>, ConfigError> {
        let definitions = self.definitions.read().map_err(|_| lock_error())?;
        Ok(definitions.iter().filter(|d| d.enabled).cloned().collect())
    }

    async fn get_query_definition(&self, id: &str) -> Result<Option<QueryDefinition>, ConfigError> {
        let definitions = self.definitions.read().map_err(|_| lock_error())?;
        Ok(definitions.iter().find(|d| d.id == id).cloned())
    }

    async fn save_query_definition(&self, definition: QueryDefinition) -> Result<(), ConfigError> {
        check_definition(&definition)?;
        self.upsert(definition)
    }

    async fn delete_query_definition(&self, id: &str) -> Result<(), ConfigError> {
        let mut definitions = self.definitions.write().map_err(|_| lock_error())?;
        let position = definitions
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| ConfigError::NotFound(id.to_string()))?;
        definitions.remove(position);
        Ok(())
    }

    async fn set_query_enabled(
        &self,
        id: &str,
        enabled: bool,
    ) -> Result<QueryDefinition, ConfigError> {
        let mut definitions = self.definitions.write().map_err(|_| lock_error())?;
        let definition = definitions
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| ConfigError::NotFound(id.to_string()))?;
        definition.enabled = enabled;
        Ok(definition.clone())
    }
}

/// `ClickHouse`-backed provider over the `query_configs` table.
#[derive(Clone)]
pub struct ClickHouseConfigProvider {
    client: Arc<clickhouse::Client>,
}

#[derive(clickhouse::Row, serde::Deserialize)]
struct QueryConfigRow {
    query_id: String,
    name: String,
    description: String,
    query: String,
    time_range: String,
    retry_count: u32,
    retry_interval: String,
    enabled: u8,
    tags: Vec<String>,
}

impl TryFrom<QueryConfigRow> for QueryDefinition {
    type Error = ConfigError;

    fn try_from(row: QueryConfigRow) -> Result<Self, Self::Error> {
        let time_range = if row.time_range.trim().is_empty() {
            None
        } else {
            Some(
                serde_json::from_str::<TimeRangeConfig>(&row.time_range).map_err(|e| {
                    ConfigError::InvalidDefinition {
                        id: row.query_id.clone(),
                        reason: format!("Invalid time_range JSON: {e}"),
                    }
                })?,
            )
        };

        Ok(Self {
            id: row.query_id,
            name: row.name,
            description: row.description,
            query: row.query,
            time_range,
            retry_count: row.retry_count,
            retry_interval: row.retry_interval,
            enabled: row.enabled != 0,
            tags: row.tags,
        })
    }
}

#[derive(clickhouse::Row, serde::Serialize)]
struct QueryConfigInsertRow {
    query_id: String,
    name: String,
    description: String,
    query: String,
    time_range: String,
    retry_count: u32,
    retry_interval: String,
    enabled: u8,
    tags: Vec<String>,
    created_at: i64,
    updated_at: i64,
}

impl QueryConfigInsertRow {
    fn new(
        definition: QueryDefinition,
        created_at: i64,
        updated_at: i64,
    ) -> Result<Self, ConfigError> {
        let time_range = match &definition.time_range {
            Some(time_range) => serde_json::to_string(time_range)
                .map_err(|e| ConfigError::Store(e.to_string()))?,
            None => String::new(),
        };

        Ok(Self {
            query_id: definition.id,
            name: definition.name,
            description: definition.description,
            query: definition.query,
            time_range,
            retry_count: definition.retry_count,
            retry_interval: definition.retry_interval,
            enabled: u8::from(definition.enabled),
            tags: definition.tags,
            created_at,
            updated_at,
        })
    }
}

#[derive(clickhouse::Row, serde::Deserialize)]
struct CreatedAtRow {
    created_at: i64,
}

const SELECT_COLUMNS: &str = "SELECT query_id, name, description, query, time_range, \
     retry_count, retry_interval, enabled, tags FROM query_configs";

impl ClickHouseConfigProvider {
    /// Creates a provider with the given client.
    #[must_use]
    pub fn new(client: Arc<clickhouse::Client>) -> Self {
        Self { client }
    }

    /// Creates a provider wrapped in an Arc.
    #[must_use]
    pub fn new_shared(client: Arc<clickhouse::Client>) -> Arc<Self> {
        Arc::new(Self::new(client))
    }

    /// Creates the `query_configs` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Load` if the statement fails.
    pub async fn ensure_schema(&self) -> Result<(), ConfigError> {
        let statement = format!(
            "CREATE TABLE IF NOT EXISTS {QUERY_CONFIGS_TABLE} (
                query_id String,
                name String,
                description String,
                query String,
                time_range String,
                retry_count UInt32,
                retry_interval String,
                enabled UInt8,
                tags Array(String),
                created_at DateTime64(3) DEFAULT now64(3),
                updated_at DateTime64(3) DEFAULT now64(3)
            ) ENGINE = ReplacingMergeTree(updated_at)
            ORDER BY query_id"
        );

        self.client
            .query(&statement)
            .execute()
            .await
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Looks up one definition by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is invalid.
    pub async fn get(&self, id: &str) -> Result<Option<QueryDefinition>, ConfigError> {
        let rows = self
            .client
            .query(&format!("{SELECT_COLUMNS} FINAL WHERE query_id = ? LIMIT 1"))
            .bind(id)
            .fetch_all::<QueryConfigRow>()
            .await
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        rows.into_iter().next().map(QueryDefinition::try_from).transpose()
    }

    async fn created_at(&self, id: &str) -> Result<Option<i64>, ConfigError> {
        let rows = self
            .client
            .query(&format!(
                "SELECT created_at FROM {QUERY_CONFIGS_TABLE} FINAL WHERE query_id = ? LIMIT 1"
            ))
            .bind(id)
            .fetch_all::<CreatedAtRow>()
            .await
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        Ok(rows.into_iter().next().map(|row| row.created_at))
    }

    /// Writes a new row version. `ReplacingMergeTree(updated_at)` keeps the
    /// latest one per `query_id`.
    async fn write(&self, definition: QueryDefinition, created_at: i64) -> Result<(), ConfigError> {
        let row = QueryConfigInsertRow::new(definition, created_at, Utc::now().timestamp_millis())?;

        let write = async {
            let mut insert = self
                .client
                .insert::<QueryConfigInsertRow>(QUERY_CONFIGS_TABLE)
                .await?;
            insert.write(&row).await?;
            insert.end().await
        };

        write.await.map_err(|e| ConfigError::Store(e.to_string()))
    }
}

#[async_trait]
impl ConfigProvider for ClickHouseConfigProvider {
    async fn list_enabled_query_definitions(&self) -> Result<Vec<QueryDefinition>, ConfigError> {
        let rows = self
            .client
            .query(&format!(
                "{SELECT_COLUMNS} FINAL WHERE enabled = 1 ORDER BY created_at"
            ))
            .fetch_all::<QueryConfigRow>()
            .await
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let mut definitions = Vec::with_capacity(rows.len());
        for row in rows {
            match QueryDefinition::try_from(row) {
                Ok(definition) => definitions.push(definition),
                Err(e) => tracing::warn!(error = %e, "Skipping invalid query definition"),
            }
        }

        tracing::debug!(count = definitions.len(), "Loaded query definitions");
        Ok(definitions)
    }

    async fn get_query_definition(&self, id: &str) -> Result<Option<QueryDefinition>, ConfigError> {
        self.get(id).await
    }

    async fn save_query_definition(&self, definition: QueryDefinition) -> Result<(), ConfigError> {
        check_definition(&definition)?;

        let created_at = self
            .created_at(&definition.id)
            .await?
            .unwrap_or_else(|| Utc::now().timestamp_millis());

        tracing::info!(query_id = %definition.id, "Saving query definition");
        self.write(definition, created_at).await
    }

    async fn delete_query_definition(&self, id: &str) -> Result<(), ConfigError> {
        if self.created_at(id).await?.is_none() {
            return Err(ConfigError::NotFound(id.to_string()));
        }

        self.client
            .query(&format!("DELETE FROM {QUERY_CONFIGS_TABLE} WHERE query_id = ?"))
            .bind(id)
            .execute()
            .await
            .map_err(|e| ConfigError::Store(e.to_string()))?;

        tracing::info!(query_id = %id, "Deleted query definition");
        Ok(())
    }

    async fn set_query_enabled(
        &self,
        id: &str,
        enabled: bool,
    ) -> Result<QueryDefinition, ConfigError> {
        let (Some(mut definition), Some(created_at)) =
            (self.get(id).await?, self.created_at(id).await?)
        else {
            return Err(ConfigError::NotFound(id.to_string()));
        };

        definition.enabled = enabled;
        self.write(definition.clone(), created_at).await?;

        tracing::info!(query_id = %id, enabled, "Toggled query definition");
        Ok(definition)
    }
}

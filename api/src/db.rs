//! Database connection module for `ClickHouse`.
//!
//! Creates the client from environment variables and hands out the
//! `ClickHouse`-backed record store and query definition provider.

use anyhow::{Context, Result};
use clickhouse::Client;
use shared::storage::{ClickHouseConfigProvider, ClickHouseRecordStore};
use std::sync::Arc;

/// Database configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `ClickHouse` database URL (e.g., <http://localhost:8123>)
    pub url: String,
    /// Database name to use
    pub database: String,
    /// Username for authentication
    pub user: String,
    /// Password for authentication
    pub password: String,
}

impl DatabaseConfig {
    /// Load database configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PROMTRAIL_DB_URL`: Database URL (default: <http://localhost:8123>)
    /// - `PROMTRAIL_DB_NAME`: Database name (default: "promtrail")
    /// - `PROMTRAIL_DB_USER`: Database user (default: "default")
    /// - `PROMTRAIL_DB_PASSWORD`: Database password (default: empty)
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("PROMTRAIL_DB_URL")
                .unwrap_or_else(|_| "http://localhost:8123".to_string()),
            database: std::env::var("PROMTRAIL_DB_NAME")
                .unwrap_or_else(|_| "promtrail".to_string()),
            user: std::env::var("PROMTRAIL_DB_USER").unwrap_or_else(|_| "default".to_string()),
            password: std::env::var("PROMTRAIL_DB_PASSWORD").unwrap_or_default(),
        }
    }
}

/// Database client wrapper.
#[derive(Clone)]
pub struct Database {
    client: Arc<Client>,
}

impl Database {
    /// Create a new database client from configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// # use api::db::{Database, DatabaseConfig};
    /// let config = DatabaseConfig::from_env();
    /// let db = Database::new(&config);
    /// let _store = db.record_store();
    /// ```
    #[must_use]
    pub fn new(config: &DatabaseConfig) -> Self {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.user)
            .with_password(&config.password);

        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying `ClickHouse` client.
    #[must_use]
    pub fn client(&self) -> Arc<Client> {
        Arc::clone(&self.client)
    }

    /// Record store backed by this database.
    #[must_use]
    pub fn record_store(&self) -> Arc<ClickHouseRecordStore> {
        ClickHouseRecordStore::new_shared(self.client())
    }

    /// Query definition provider backed by this database.
    #[must_use]
    pub fn config_provider(&self) -> Arc<ClickHouseConfigProvider> {
        ClickHouseConfigProvider::new_shared(self.client())
    }

    /// Creates every table the service uses if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.record_store()
            .ensure_schema()
            .await
            .context("Failed to create record tables")?;
        self.config_provider()
            .ensure_schema()
            .await
            .context("Failed to create query_configs table")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_with_custom_values() {
        let config = DatabaseConfig {
            url: "http://custom:8123".to_string(),
            database: "test_db".to_string(),
            user: "test_user".to_string(),
            password: "test_pass".to_string(),
        };

        let db = Database::new(&config);

        assert_eq!(Arc::strong_count(&db.client()), 2);
    }

    #[test]
    fn test_database_is_clone() {
        let db = Database::new(&DatabaseConfig::from_env());
        let db2 = db.clone();

        assert!(Arc::ptr_eq(&db.client(), &db2.client()));
    }

    #[tokio::test]
    async fn test_ensure_schema_unreachable_database_fails() {
        let config = DatabaseConfig {
            url: "http://127.0.0.1:1".to_string(),
            database: "promtrail".to_string(),
            user: "default".to_string(),
            password: String::new(),
        };

        assert!(Database::new(&config).ensure_schema().await.is_err());
    }
}

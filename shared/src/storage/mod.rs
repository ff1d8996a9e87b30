//! Storage traits and implementations.
//!
//! The executor persists through the `RecordStore` trait and discovers its
//! work through the `ConfigProvider` trait. Both come with an in-memory
//! implementation for development and testing and a `ClickHouse`-backed one.

pub mod config_store;
pub mod record_store;

pub use config_store::{
    ClickHouseConfigProvider, ConfigProvider, InMemoryConfigProvider, QUERY_CONFIGS_TABLE,
};
pub use record_store::{
    ClickHouseRecordStore, InMemoryRecordStore, RecordStore, StoreError, EXECUTIONS_TABLE,
    METRIC_RECORDS_TABLE,
};

//! Configuration helpers shared by the service and the CLI.
//!
//! Settings arrive as strings (environment variables, CLI flags, database
//! columns); this module turns them into typed values.

pub mod timezone;

pub use timezone::{parse_utc_offset, DEFAULT_TIMEZONE};

use thiserror::Error;

/// Errors that can occur while loading or interpreting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The timezone setting is not a UTC offset.
    #[error("Invalid timezone offset: '{0}'. Expected a UTC offset such as '+08:00'")]
    InvalidTimezone(String),

    /// A setting has a value that cannot be interpreted.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue {
        /// The setting name.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// Query definitions could not be loaded.
    #[error("Failed to load query definitions: {0}")]
    Load(String),

    /// No query definition has the given id.
    #[error("No query definition found with id '{0}'")]
    NotFound(String),

    /// A query definition could not be written or removed.
    #[error("Failed to store query definition: {0}")]
    Store(String),

    /// A stored query definition is invalid.
    #[error("Invalid query definition '{id}': {reason}")]
    InvalidDefinition {
        /// The query id.
        id: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Parses a boolean setting (`true/false`, `1/0`, `yes/no`, `on/off`).
///
/// # Errors
///
/// Returns `InvalidValue` for anything else.
pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

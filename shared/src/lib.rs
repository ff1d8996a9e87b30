//! Promtrail Shared Library
//!
//! The ETL core of promtrail: it resolves relative time expressions, plans
//! queries against a metrics source, normalizes the returned samples and
//! persists them with one audit record per execution.
//!
//! # Modules
//!
//! - [`timeexpr`] - Relative time expressions and Go-style durations
//! - [`models`] - Query definitions, wire format, records
//! - [`planner`] - Query definition to source request
//! - [`normalize`] - Raw samples to normalized records
//! - [`source`] - Metrics source trait and clients
//! - [`storage`] - Record store and query definition providers
//! - [`executor`] - Retrying executor
//! - [`config`] - Shared configuration helpers
//!
//! # Example
//!
//! ```
//! use chrono::{FixedOffset, TimeZone, Utc};
//! use shared::models::{QueryDefinition, TimeRangeConfig};
//! use shared::planner::{QueryPlanner, SourceRequest};
//! use shared::timeexpr::ReferenceInstant;
//!
//! let reference = ReferenceInstant::new(
//!     Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap(),
//!     FixedOffset::east_opt(8 * 3600).unwrap(),
//! );
//! let query = QueryDefinition::new("daily_up", "avg_over_time(up[1d])")
//!     .with_time_range(TimeRangeConfig::instant("today"));
//!
//! let request = QueryPlanner::default().plan(&query, &reference).unwrap();
//! assert!(matches!(request, SourceRequest::Instant { .. }));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod executor;
pub mod models;
pub mod normalize;
pub mod planner;
pub mod source;
pub mod storage;
pub mod timeexpr;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use tokio_util;
pub use validator;

//! Data models for promtrail.
//!
//! Query definitions, the metrics source wire format, normalized records and
//! execution audit records.

pub mod execution;
pub mod query;
pub mod sample;

pub use execution::{Completion, ExecutionRecord, ExecutionStatus};
pub use query::{QueryDefinition, QueryValidationError, TimeRangeConfig, DEFAULT_RETRY_INTERVAL};
pub use sample::{
    NormalizedRecord, QueryData, QueryResult, RawSample, RecordError, ResultKind, SourceResponse,
    METRIC_NAME_LABEL, STATUS_SUCCESS,
};

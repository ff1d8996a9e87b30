//! Execution audit record.
//!
//! One `ExecutionRecord` is written per invocation of the executor. End time
//! and duration live together in [`Completion`] so one cannot be set without
//! the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// The execution has started.
    Running,
    /// An attempt succeeded.
    Success,
    /// All attempts failed, or the run was cancelled.
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal timing of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// When the execution reached a terminal state.
    pub end_time: DateTime<Utc>,
    /// Elapsed time from start to terminal state, retry sleeps included.
    pub duration_ms: u64,
}

impl Completion {
    /// Builds the completion of an execution that started at `start_time`
    /// and ran for `elapsed`.
    #[must_use]
    pub fn after(start_time: DateTime<Utc>, elapsed: Duration) -> Self {
        let end_time = chrono::TimeDelta::from_std(elapsed)
            .ok()
            .and_then(|delta| start_time.checked_add_signed(delta))
            .unwrap_or(start_time);

        Self {
            end_time,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Audit record of one query execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Query identifier.
    pub query_id: String,
    /// Query name.
    pub query_name: String,
    /// Current status.
    pub status: ExecutionStatus,
    /// When the execution started.
    pub start_time: DateTime<Utc>,
    /// End time and duration, present once terminal.
    #[serde(flatten, default)]
    pub completion: Option<Completion>,
    /// Number of records persisted.
    pub records_count: u64,
    /// Number of attempts made.
    pub attempts: u32,
    /// Terminal error text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ExecutionRecord {
    /// A running record.
    #[must_use]
    pub fn start(
        query_id: impl Into<String>,
        query_name: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            query_name: query_name.into(),
            status: ExecutionStatus::Running,
            start_time,
            completion: None,
            records_count: 0,
            attempts: 0,
            error_message: None,
        }
    }

    /// Marks the record successful.
    #[must_use]
    pub fn succeed(mut self, elapsed: Duration, attempts: u32, records_count: u64) -> Self {
        self.status = ExecutionStatus::Success;
        self.completion = Some(Completion::after(self.start_time, elapsed));
        self.attempts = attempts;
        self.records_count = records_count;
        self.error_message = None;
        self
    }

    /// Marks the record failed.
    #[must_use]
    pub fn fail(mut self, elapsed: Duration, attempts: u32, error: impl Into<String>) -> Self {
        self.status = ExecutionStatus::Failed;
        self.completion = Some(Completion::after(self.start_time, elapsed));
        self.attempts = attempts;
        self.error_message = Some(error.into());
        self
    }

    /// End time, if terminal.
    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.completion.map(|c| c.end_time)
    }

    /// Duration, if terminal.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.completion.map(|c| Duration::from_millis(c.duration_ms))
    }

    /// Returns true once the record reached success or failure.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status != ExecutionStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_start_is_running_without_completion() {
        let record = ExecutionRecord::start("q1", "Query one", start_time());

        assert_eq!(record.status, ExecutionStatus::Running);
        assert!(record.end_time().is_none());
        assert!(record.duration().is_none());
        assert!(!record.is_terminal());
    }

    #[test]
    fn test_succeed_sets_end_time_and_duration_together() {
        let record = ExecutionRecord::start("q1", "Query one", start_time()).succeed(
            Duration::from_millis(1500),
            2,
            10,
        );

        assert_eq!(record.status, ExecutionStatus::Success);
        assert_eq!(record.records_count, 10);
        assert_eq!(record.attempts, 2);
        assert_eq!(record.duration(), Some(Duration::from_millis(1500)));
        assert_eq!(
            record.end_time(),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 1).unwrap() + chrono::TimeDelta::milliseconds(500))
        );
    }

    #[test]
    fn test_fail_keeps_error() {
        let record = ExecutionRecord::start("q1", "Query one", start_time()).fail(
            Duration::from_secs(3),
            1,
            "Query failed after 1 attempt(s): boom",
        );

        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.is_terminal());
        assert_eq!(record.records_count, 0);
        assert!(record.error_message.unwrap().contains("1 attempt"));
    }

    #[test]
    fn test_serialize_flattens_completion() {
        let record = ExecutionRecord::start("q1", "Query one", start_time()).succeed(
            Duration::from_secs(2),
            1,
            3,
        );

        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["duration_ms"], 2000);
        assert!(json.get("end_time").is_some());
        assert!(json.get("error_message").is_none());
    }
}

//! Service configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use shared::config::{parse_bool, parse_utc_offset, DEFAULT_TIMEZONE};
use shared::executor::ExecutorOptions;
use shared::planner::PlanMode;
use shared::timeexpr::parse_duration;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Default interval between two scheduled runs.
pub const DEFAULT_RUN_INTERVAL: Duration = Duration::from_secs(60);

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("Invalid log format '{other}', expected 'pretty' or 'json'"),
        }
    }
}

/// Service configuration.
///
/// Configuration values can be set via environment variables:
/// - `PROMTRAIL_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `PROMTRAIL_PORT`: The port to listen on (default: 8080)
/// - `PROMTRAIL_RUN_INTERVAL`: Time between scheduled runs (default: `60s`)
/// - `PROMTRAIL_TIMEZONE`: UTC offset for day boundaries (default: `+08:00`)
/// - `PROMTRAIL_PLAN_MODE`: `lenient` or `strict` (default: `lenient`)
/// - `PROMTRAIL_FAIL_FAST`: Stop retrying on plan errors (default: false)
/// - `PROMTRAIL_LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Time between scheduled runs.
    pub run_interval: Duration,
    /// Zone used for day boundaries.
    pub timezone: FixedOffset,
    /// How unknown range types are planned.
    pub plan_mode: PlanMode,
    /// Stop retrying on plan errors.
    pub fail_fast: bool,
    /// Log output format.
    pub log_format: LogFormat,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = env_var("PROMTRAIL_HOST").unwrap_or(defaults.host);

        let port = env_var("PROMTRAIL_PORT")
            .map(|p| p.parse::<u16>())
            .transpose()
            .context("Invalid PROMTRAIL_PORT")?
            .unwrap_or(defaults.port);

        let run_interval = env_var("PROMTRAIL_RUN_INTERVAL")
            .map(|v| parse_duration(&v))
            .transpose()
            .context("Invalid PROMTRAIL_RUN_INTERVAL")?
            .unwrap_or(defaults.run_interval);
        anyhow::ensure!(!run_interval.is_zero(), "PROMTRAIL_RUN_INTERVAL must be positive");

        let timezone = env_var("PROMTRAIL_TIMEZONE")
            .map(|v| parse_utc_offset(&v))
            .transpose()?
            .unwrap_or(defaults.timezone);

        let plan_mode = env_var("PROMTRAIL_PLAN_MODE")
            .map(|v| v.parse::<PlanMode>())
            .transpose()?
            .unwrap_or(defaults.plan_mode);

        let fail_fast = env_var("PROMTRAIL_FAIL_FAST")
            .map(|v| parse_bool("PROMTRAIL_FAIL_FAST", &v))
            .transpose()?
            .unwrap_or(defaults.fail_fast);

        let log_format = env_var("PROMTRAIL_LOG_FORMAT")
            .map(|v| v.parse::<LogFormat>())
            .transpose()?
            .unwrap_or(defaults.log_format);

        Ok(Self {
            host,
            port,
            run_interval,
            timezone,
            plan_mode,
            fail_fast,
            log_format,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Executor options derived from this configuration.
    #[must_use]
    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions::default()
            .with_plan_mode(self.plan_mode)
            .with_fail_fast(self.fail_fast)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            run_interval: DEFAULT_RUN_INTERVAL,
            timezone: parse_utc_offset(DEFAULT_TIMEZONE).unwrap_or_else(|_| Utc.fix()),
            plan_mode: PlanMode::default(),
            fail_fast: false,
            log_format: LogFormat::default(),
        }
    }
}

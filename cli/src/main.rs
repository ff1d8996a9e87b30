//! Promtrail CLI
//!
//! Command-line interface for operating promtrail.
//!
//! # Usage
//!
//! ```bash
//! promtrail --help
//! promtrail resolve now-1d/d now/d --at 2024-01-15T06:00:00Z
//! promtrail window
//! promtrail check
//! promtrail run daily_up
//! promtrail queries save queries.json
//! promtrail queries disable daily_up
//! promtrail health
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use clap::{Args, Parser, Subcommand};
use shared::config::{parse_utc_offset, DEFAULT_TIMEZONE};
use shared::executor::QueryExecutor;
use shared::models::{ExecutionStatus, QueryDefinition};
use shared::source::{MetricsSource, PrometheusClient, PrometheusConfig};
use shared::storage::{
    ClickHouseConfigProvider, ClickHouseRecordStore, ConfigProvider, InMemoryConfigProvider,
};
use shared::timeexpr::{parse_duration, today_window, yesterday_window, ReferenceInstant, TimeExpression};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Promtrail CLI - Prometheus to ClickHouse ETL command-line interface
#[derive(Parser)]
#[command(name = "promtrail")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Service URL
    #[arg(
        short,
        long,
        env = "PROMTRAIL_API_URL",
        default_value = "http://localhost:8080"
    )]
    api_url: String,

    /// UTC offset used for day boundaries
    #[arg(
        short,
        long,
        global = true,
        env = "PROMTRAIL_TIMEZONE",
        default_value = DEFAULT_TIMEZONE,
        allow_hyphen_values = true
    )]
    timezone: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve time expressions against one reference instant
    Resolve {
        /// Expressions such as `now-1d/d`, `yesterday@08:00` or `-2h`
        #[arg(required = true, allow_hyphen_values = true)]
        expressions: Vec<String>,

        /// Reference instant (RFC 3339), the current time when omitted
        #[arg(long)]
        at: Option<String>,
    },
    /// Print yesterday's and today's windows
    Window {
        /// Reference instant (RFC 3339), the current time when omitted
        #[arg(long)]
        at: Option<String>,
    },
    /// Check that the metrics source and the record store are reachable
    Check(Backends),
    /// Run one query definition now
    Run {
        /// Query definition id
        id: String,

        /// Read definitions from a JSON file instead of the database
        #[arg(long, env = "PROMTRAIL_DEFINITIONS")]
        definitions: Option<std::path::PathBuf>,

        #[command(flatten)]
        backends: Backends,
    },
    /// List the metric names known to the metrics source
    Metrics(Backends),
    /// Manage stored query definitions
    Queries(QueriesArgs),
    /// Check service health
    Health,
}

#[derive(Args)]
struct QueriesArgs {
    #[command(flatten)]
    backends: Backends,

    #[command(subcommand)]
    command: QueryCommands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum QueryCommands {
    /// List enabled definitions, oldest first
    List,
    /// Print one definition as JSON
    Show { id: String },
    /// Create or replace definitions from a JSON file (an object or an array)
    Save { file: std::path::PathBuf },
    /// Delete a definition
    Delete { id: String },
    /// Enable a definition
    Enable { id: String },
    /// Disable a definition
    Disable { id: String },
}

/// Connection settings for the metrics source and the database.
#[derive(Args, Clone)]
struct Backends {
    /// Prometheus base URL
    #[arg(long, env = "PROMTRAIL_PROMETHEUS_URL", default_value = "http://localhost:9090")]
    prometheus_url: String,

    /// Prometheus request timeout
    #[arg(long, env = "PROMTRAIL_PROMETHEUS_TIMEOUT", default_value = "30s")]
    prometheus_timeout: String,

    /// `ClickHouse` URL
    #[arg(long, env = "PROMTRAIL_DB_URL", default_value = "http://localhost:8123")]
    db_url: String,

    /// `ClickHouse` database
    #[arg(long, env = "PROMTRAIL_DB_NAME", default_value = "promtrail")]
    db_name: String,

    /// `ClickHouse` user
    #[arg(long, env = "PROMTRAIL_DB_USER", default_value = "default")]
    db_user: String,

    /// `ClickHouse` password
    #[arg(long, env = "PROMTRAIL_DB_PASSWORD", default_value = "", hide_env_values = true)]
    db_password: String,
}

impl Backends {
    fn source(&self) -> Result<PrometheusClient> {
        let timeout = parse_duration(&self.prometheus_timeout)
            .with_context(|| format!("Invalid Prometheus timeout '{}'", self.prometheus_timeout))?;
        PrometheusClient::new(&PrometheusConfig::new(&self.prometheus_url, timeout))
            .context("Failed to create Prometheus client")
    }

    fn client(&self) -> Arc<clickhouse::Client> {
        Arc::new(
            clickhouse::Client::default()
                .with_url(&self.db_url)
                .with_database(&self.db_name)
                .with_user(&self.db_user)
                .with_password(&self.db_password),
        )
    }

    fn executor(&self) -> Result<QueryExecutor> {
        Ok(QueryExecutor::new(
            Arc::new(self.source()?),
            ClickHouseRecordStore::new_shared(self.client()),
        ))
    }
}

fn reference_at(at: Option<&str>, zone: FixedOffset) -> Result<ReferenceInstant> {
    match at {
        None => Ok(ReferenceInstant::capture(zone)),
        Some(at) => {
            let instant = DateTime::parse_from_rfc3339(at)
                .with_context(|| format!("Invalid reference instant '{at}'"))?;
            Ok(ReferenceInstant::new(instant.with_timezone(&Utc), zone))
        }
    }
}

/// One output line per expression; errors are reported inline.
fn resolve_lines(expressions: &[String], reference: &ReferenceInstant) -> Vec<String> {
    expressions
        .iter()
        .map(|expr| {
            match TimeExpression::parse(expr).and_then(|e| e.resolve(reference)) {
                Ok(instant) => format!("{expr:<24} {}", instant.to_rfc3339()),
                Err(e) => format!("{expr:<24} error: {e}"),
            }
        })
        .collect()
}

async fn run_query(
    id: &str,
    definitions: Option<&std::path::Path>,
    backends: &Backends,
    zone: FixedOffset,
) -> Result<()> {
    let provider: Arc<dyn ConfigProvider> = match definitions {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Arc::new(InMemoryConfigProvider::from_json(&json)?)
        }
        None => ClickHouseConfigProvider::new_shared(backends.client()),
    };

    let definition = provider
        .get_query_definition(id)
        .await?
        .with_context(|| format!("No query definition with id '{id}'"))?;

    tracing::info!(query_id = %definition.id, "Running query");

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let record = backends
        .executor()?
        .run_query(&definition, &ReferenceInstant::capture(zone), &cancel)
        .await;

    println!("{}", serde_json::to_string_pretty(&record)?);
    anyhow::ensure!(
        record.status == ExecutionStatus::Success,
        "Query '{id}' failed"
    );
    Ok(())
}

fn parse_definitions(json: &str) -> Result<Vec<QueryDefinition>> {
    let value: serde_json::Value = serde_json::from_str(json).context("Invalid JSON")?;
    let definitions = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(definitions)
}

/// Applies one management command and returns the text to print.
async fn manage_queries(provider: &dyn ConfigProvider, command: QueryCommands) -> Result<String> {
    let output = match command {
        QueryCommands::List => provider
            .list_enabled_query_definitions()
            .await?
            .iter()
            .map(|d| format!("{:<24} {}", d.id, d.query))
            .collect::<Vec<_>>()
            .join("\n"),
        QueryCommands::Show { id } => {
            let definition = provider
                .get_query_definition(&id)
                .await?
                .with_context(|| format!("No query definition with id '{id}'"))?;
            serde_json::to_string_pretty(&definition)?
        }
        QueryCommands::Save { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let definitions = parse_definitions(&json)?;
            let count = definitions.len();
            for definition in definitions {
                provider.save_query_definition(definition).await?;
            }
            format!("Saved {count} query definition(s)")
        }
        QueryCommands::Delete { id } => {
            provider.delete_query_definition(&id).await?;
            format!("Deleted '{id}'")
        }
        QueryCommands::Enable { id } => {
            provider.set_query_enabled(&id, true).await?;
            format!("Enabled '{id}'")
        }
        QueryCommands::Disable { id } => {
            provider.set_query_enabled(&id, false).await?;
            format!("Disabled '{id}'")
        }
    };
    Ok(output)
}

async fn check_health(api_url: &str) -> Result<()> {
    let url = format!("{}/health", api_url.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("Failed to reach {url}"))?;

    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    anyhow::ensure!(status.is_success(), "Service returned {status}");

    println!(
        "{} is {} (version {})",
        api_url,
        body["status"].as_str().unwrap_or("unknown"),
        body["version"].as_str().unwrap_or("unknown")
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let zone = parse_utc_offset(&cli.timezone)?;

    match cli.command {
        Some(Commands::Resolve { expressions, at }) => {
            let reference = reference_at(at.as_deref(), zone)?;
            println!("reference                {}", reference.local().to_rfc3339());
            for line in resolve_lines(&expressions, &reference) {
                println!("{line}");
            }
        }
        Some(Commands::Window { at }) => {
            let reference = reference_at(at.as_deref(), zone)?;
            let yesterday = yesterday_window(&reference)?;
            let today = today_window(&reference)?;
            println!("yesterday  [{}, {})", yesterday.start.to_rfc3339(), yesterday.end.to_rfc3339());
            println!("today      [{}, {})", today.start.to_rfc3339(), today.end.to_rfc3339());
        }
        Some(Commands::Check(backends)) => {
            backends.executor()?.preflight().await?;
            println!("Metrics source and record store are reachable");
        }
        Some(Commands::Run {
            id,
            definitions,
            backends,
        }) => {
            run_query(&id, definitions.as_deref(), &backends, zone).await?;
        }
        Some(Commands::Metrics(backends)) => {
            for name in backends.source()?.list_metric_names().await? {
                println!("{name}");
            }
        }
        Some(Commands::Queries(args)) => {
            let provider = ClickHouseConfigProvider::new(args.backends.client());
            println!("{}", manage_queries(&provider, args.command).await?);
        }
        Some(Commands::Health) => {
            check_health(&cli.api_url).await?;
        }
        None => {
            println!("Promtrail CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn zone() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from(["promtrail"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_health_command() {
        let cli = Cli::try_parse_from(["promtrail", "health"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Health)));
    }

    #[test]
    fn test_cli_resolve_accepts_negative_shorthand() {
        let cli = Cli::try_parse_from(["promtrail", "resolve", "-1d", "now-1d/d"]).unwrap();
        match cli.command {
            Some(Commands::Resolve { expressions, at }) => {
                assert_eq!(expressions, vec!["-1d", "now-1d/d"]);
                assert!(at.is_none());
            }
            _ => panic!("Expected resolve command"),
        }
    }

    #[test]
    fn test_cli_resolve_requires_expression() {
        assert!(Cli::try_parse_from(["promtrail", "resolve"]).is_err());
    }

    #[test]
    fn test_cli_timezone_after_subcommand() {
        let cli =
            Cli::try_parse_from(["promtrail", "window", "--timezone", "-05:00"]).unwrap();
        assert_eq!(cli.timezone, "-05:00");
        assert!(matches!(cli.command, Some(Commands::Window { at: None })));
    }

    #[test]
    fn test_cli_run_command() {
        let cli = Cli::try_parse_from([
            "promtrail",
            "run",
            "daily_up",
            "--definitions",
            "queries.json",
            "--prometheus-url",
            "http://prom:9090",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Run {
                id,
                definitions,
                backends,
            }) => {
                assert_eq!(id, "daily_up");
                assert_eq!(definitions.unwrap().to_str(), Some("queries.json"));
                assert_eq!(backends.prometheus_url, "http://prom:9090");
            }
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_reference_at() {
        let reference = reference_at(Some("2024-01-15T14:30:45Z"), zone()).unwrap();
        assert_eq!(
            reference.instant(),
            Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 45).unwrap()
        );
        assert!(reference_at(Some("yesterday"), zone()).is_err());
    }

    #[test]
    fn test_resolve_lines() {
        let reference = reference_at(Some("2024-01-15T14:30:45Z"), zone()).unwrap();
        let lines = resolve_lines(
            &["now-1d/d".to_string(), "last tuesday".to_string()],
            &reference,
        );

        assert!(lines[0].ends_with("2024-01-14T00:00:00+08:00"));
        assert!(lines[1].contains("error: Unsupported time expression"));
    }

    #[test]
    fn test_cli_queries_command() {
        let cli = Cli::try_parse_from([
            "promtrail",
            "queries",
            "--db-name",
            "etl",
            "disable",
            "daily_up",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Queries(args)) => {
                assert_eq!(args.backends.db_name, "etl");
                assert_eq!(
                    args.command,
                    QueryCommands::Disable {
                        id: "daily_up".to_string()
                    }
                );
            }
            _ => panic!("Expected queries command"),
        }
    }

    #[test]
    fn test_parse_definitions() {
        let one = parse_definitions(r#"{"id": "q1", "query": "up"}"#).unwrap();
        assert_eq!(one.len(), 1);

        let many =
            parse_definitions(r#"[{"id": "q1", "query": "up"}, {"id": "q2", "query": "up"}]"#)
                .unwrap();
        assert_eq!(many[1].id, "q2");

        assert!(parse_definitions("[{").is_err());
    }

    #[tokio::test]
    async fn test_manage_queries() {
        let provider = InMemoryConfigProvider::with_definitions(vec![
            QueryDefinition::new("q1", "up"),
            QueryDefinition::new("q2", "node_load1"),
        ]);

        let output = manage_queries(&provider, QueryCommands::Disable { id: "q1".to_string() })
            .await
            .unwrap();
        assert_eq!(output, "Disabled 'q1'");

        let output = manage_queries(&provider, QueryCommands::List).await.unwrap();
        assert!(output.starts_with("q2"));
        assert!(!output.contains("q1"));

        let output = manage_queries(&provider, QueryCommands::Show { id: "q1".to_string() })
            .await
            .unwrap();
        assert!(output.contains("\"enabled\": false"));

        assert!(
            manage_queries(&provider, QueryCommands::Delete { id: "missing".to_string() })
                .await
                .is_err()
        );
    }

    #[test]
    fn test_backends_reject_bad_timeout() {
        let cli = Cli::try_parse_from([
            "promtrail",
            "metrics",
            "--prometheus-timeout",
            "soon",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Metrics(backends)) => assert!(backends.source().is_err()),
            _ => panic!("Expected metrics command"),
        }
    }
}

// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store-backed subcommands. Each returns a serializable result that the
//! entry point prints as JSON.

use std::path::Path;
use std::sync::Arc;

use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use tocsin_config::TocsinConfig;
use tocsin_core::types::{
    IncidentListRequest, IncidentSort, IncidentSortBy, Page, Pagination, SchedulerSnapshot,
    SnapshotQuery, SortDirection, TimeRange,
};
use tocsin_core::{
    Incident, IncidentStatus, IncidentStore, NewIncident, SchedulerCode, SnapshotSource,
    SnapshotStore, StoreAdapter, TocsinError,
};
use tocsin_expression::{Evaluator, ExpressionError, Value};
use tocsin_incident::{CompiledRule, Outcome, Reconciler, Rule};
use tocsin_storage::SqliteStore;

/// Failure of a subcommand.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Tocsin(#[from] TocsinError),

    /// Expression rejected before evaluation; rendered with its source.
    #[error("{0:?}")]
    Expression(miette::Report),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

fn expression_error(err: ExpressionError, source: &str) -> CliError {
    if err.is_compile_error() {
        CliError::Expression(miette::Report::new(err).with_source_code(source.to_string()))
    } else {
        CliError::Tocsin(err.into())
    }
}

/// Accept Unix milliseconds or an RFC 3339 timestamp.
pub fn parse_time_arg(value: &str) -> Result<i64, String> {
    if let Ok(ms) = value.parse::<i64>() {
        return Ok(ms);
    }
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|t| t.timestamp_millis())
        .map_err(|e| format!("expected Unix milliseconds or an RFC 3339 timestamp: {e}"))
}

fn time_range(from: Option<i64>, to: Option<i64>) -> Option<TimeRange> {
    let range = TimeRange { from, to };
    (!range.is_unbounded()).then_some(range)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Open the configured store and bring its schema up to date.
pub async fn open_store(config: &TocsinConfig) -> Result<SqliteStore, CliError> {
    let path = Path::new(&config.storage.database_path);
    if let Some(parent) = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && !p.exists())
    {
        std::fs::create_dir_all(parent).map_err(TocsinError::connection)?;
    }
    let store = SqliteStore::open(&config.storage).await?;
    store.migrate().await?;
    Ok(store)
}

pub async fn close_store(store: &SqliteStore) {
    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "store shutdown failed");
    }
}

#[derive(Debug, Serialize)]
pub struct MigrateReport {
    database_path: String,
    backend: String,
    version: String,
}

pub async fn migrate(store: &SqliteStore, config: &TocsinConfig) -> Result<MigrateReport, CliError> {
    // Schema is already applied by `open_store`.
    info!(database_path = %config.storage.database_path, "schema up to date");
    Ok(MigrateReport {
        database_path: config.storage.database_path.clone(),
        backend: store.name().to_string(),
        version: store.version().to_string(),
    })
}

// --- Incidents ---

/// Filters, sort and page for `tocsin incidents`.
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(long)]
    pub status: Option<IncidentStatus>,
    #[arg(long)]
    pub rule: Option<String>,
    /// Lower bound on start time (Unix ms or RFC 3339).
    #[arg(long, value_parser = parse_time_arg)]
    pub from: Option<i64>,
    /// Upper bound on start time (Unix ms or RFC 3339).
    #[arg(long, value_parser = parse_time_arg)]
    pub to: Option<i64>,
    #[arg(long, default_value = "start_time")]
    pub sort_by: IncidentSortBy,
    #[arg(long, default_value = "desc")]
    pub direction: SortDirection,
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long, default_value_t = Pagination::DEFAULT_LIMIT)]
    pub limit: u32,
}

impl ListArgs {
    pub fn to_request(&self) -> IncidentListRequest {
        IncidentListRequest {
            status: self.status,
            rule_id: self.rule.clone(),
            time_range: time_range(self.from, self.to),
            sort: Some(IncidentSort {
                by: self.sort_by,
                direction: self.direction,
            }),
            pagination: Pagination::new(self.page, self.limit),
        }
    }
}

pub async fn list_incidents(
    store: &SqliteStore,
    args: &ListArgs,
) -> Result<Page<Incident>, CliError> {
    Ok(store.get_incidents(&args.to_request()).await?)
}

#[derive(Subcommand, Debug)]
pub enum IncidentAction {
    /// Show one incident with its history.
    Show { incident_id: String },
    /// Move an incident to a new status.
    SetStatus {
        incident_id: String,
        status: IncidentStatus,
    },
    /// Open an incident for a rule by hand.
    Open {
        rule_id: String,
        /// Business key; generated when omitted.
        #[arg(long)]
        incident_id: Option<String>,
        /// Unix ms or RFC 3339; defaults to now.
        #[arg(long, value_parser = parse_time_arg)]
        start_time: Option<i64>,
    },
}

pub async fn incident(store: &SqliteStore, action: IncidentAction) -> Result<Incident, CliError> {
    let incident = match action {
        IncidentAction::Show { incident_id } => store.get_incident_by_id(&incident_id).await?,
        IncidentAction::SetStatus {
            incident_id,
            status,
        } => store.update_incident_status(&incident_id, status).await?,
        IncidentAction::Open {
            rule_id,
            incident_id,
            start_time,
        } => {
            let new = NewIncident::opened(
                incident_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                rule_id,
                start_time.unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
            );
            store.insert_incident(&new).await?
        }
    };
    Ok(incident)
}

// --- Snapshots ---

#[derive(Subcommand, Debug)]
pub enum SnapshotAction {
    /// Record one check result.
    Record {
        scheduler_id: String,
        code: SchedulerCode,
        #[arg(long)]
        error: Option<String>,
        #[arg(long, default_value_t = 0)]
        duration_ms: i64,
        /// Unix ms or RFC 3339; defaults to now.
        #[arg(long, value_parser = parse_time_arg)]
        timestamp: Option<i64>,
    },
    /// Page through a scheduler's snapshots.
    List {
        scheduler_id: String,
        #[arg(long)]
        status: Option<SchedulerCode>,
        #[arg(long, value_parser = parse_time_arg)]
        from: Option<i64>,
        #[arg(long, value_parser = parse_time_arg)]
        to: Option<i64>,
        #[arg(long, default_value = "desc")]
        direction: SortDirection,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = Pagination::DEFAULT_LIMIT)]
        limit: u32,
    },
    /// Share of OK checks and mean latency.
    Uptime {
        scheduler_id: String,
        #[arg(long, value_parser = parse_time_arg)]
        from: Option<i64>,
        #[arg(long, value_parser = parse_time_arg)]
        to: Option<i64>,
    },
}

pub async fn snapshots(
    store: &SqliteStore,
    action: SnapshotAction,
) -> Result<serde_json::Value, CliError> {
    let value = match action {
        SnapshotAction::Record {
            scheduler_id,
            code,
            error,
            duration_ms,
            timestamp,
        } => {
            let snapshot = SchedulerSnapshot {
                scheduler_id,
                code,
                error_message: error,
                duration_ms,
                timestamp: timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
            };
            store.insert_snapshot(&snapshot).await?;
            serde_json::to_value(snapshot)?
        }
        SnapshotAction::List {
            scheduler_id,
            status,
            from,
            to,
            direction,
            page,
            limit,
        } => {
            let query = SnapshotQuery {
                scheduler_id,
                status,
                time_range: time_range(from, to),
                direction,
                pagination: Pagination::new(page, limit),
            };
            serde_json::to_value(store.get_snapshots(&query).await?)?
        }
        SnapshotAction::Uptime {
            scheduler_id,
            from,
            to,
        } => serde_json::to_value(
            store
                .get_scheduler_uptime(&scheduler_id, time_range(from, to))
                .await?,
        )?,
    };
    Ok(value)
}

// --- Expressions ---

#[derive(Debug, Serialize)]
pub struct EvalOutput {
    scheduler_id: String,
    expression: String,
    #[serde(rename = "type")]
    ty: String,
    value: Value,
}

fn evaluator(store: &SqliteStore, config: &TocsinConfig) -> Evaluator {
    Evaluator::from_config(Arc::new(store.clone()), &config.evaluator)
}

pub async fn eval(
    store: &SqliteStore,
    config: &TocsinConfig,
    scheduler_id: &str,
    expression: &str,
) -> Result<EvalOutput, CliError> {
    let program = tocsin_expression::compile(expression)
        .map_err(|e| expression_error(e, expression))?;
    let value = evaluator(store, config)
        .evaluate(scheduler_id, &program)
        .await
        .map_err(|e| expression_error(e, expression))?;
    Ok(EvalOutput {
        scheduler_id: scheduler_id.to_string(),
        expression: expression.to_string(),
        ty: program.result_type().to_string(),
        value,
    })
}

/// Build a rule, rendering expression diagnostics against the source text.
pub fn rule(
    rule_id: String,
    scheduler_id: String,
    expression: String,
    auto_close: bool,
) -> Result<CompiledRule, CliError> {
    tocsin_expression::compile_rule(&expression).map_err(|e| expression_error(e, &expression))?;
    Ok(Rule::new(rule_id, scheduler_id, expression)
        .with_auto_close(auto_close)
        .compile()?)
}

pub async fn reconcile(
    store: &SqliteStore,
    config: &TocsinConfig,
    rule: CompiledRule,
) -> Result<Outcome, CliError> {
    let reconciler = Reconciler::new(Arc::new(store.clone()), evaluator(store, config));
    Ok(reconciler.reconcile(&rule).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tocsin_test_utils::TestHarness;

    async fn setup() -> (TestHarness, TocsinConfig) {
        let harness = TestHarness::builder().build().await.unwrap();
        let config = TocsinConfig {
            storage: harness.storage_config().clone(),
            ..TocsinConfig::default()
        };
        (harness, config)
    }

    fn list_args() -> ListArgs {
        ListArgs {
            status: None,
            rule: None,
            from: None,
            to: None,
            sort_by: IncidentSortBy::StartTime,
            direction: SortDirection::Desc,
            page: 1,
            limit: 50,
        }
    }

    fn open(rule_id: &str, incident_id: &str, start_time: i64) -> IncidentAction {
        IncidentAction::Open {
            rule_id: rule_id.into(),
            incident_id: Some(incident_id.into()),
            start_time: Some(start_time),
        }
    }

    #[test]
    fn time_args_accept_millis_and_rfc3339() {
        assert_eq!(parse_time_arg("1500").unwrap(), 1500);
        assert_eq!(parse_time_arg("1970-01-01T00:00:01.500Z").unwrap(), 1500);
        assert!(parse_time_arg("yesterday").is_err());
    }

    #[test]
    fn list_args_build_request() {
        let mut args = list_args();
        assert_eq!(args.to_request().time_range, None);
        args.from = Some(10);
        args.rule = Some("r-1".into());
        let request = args.to_request();
        assert_eq!(request.time_range.and_then(|r| r.from), Some(10));
        assert_eq!(request.rule_id.as_deref(), Some("r-1"));
    }

    #[tokio::test]
    async fn open_store_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TocsinConfig::default();
        config.storage.database_path = dir
            .path()
            .join("nested/deeper/tocsin.db")
            .display()
            .to_string();
        let store = open_store(&config).await.unwrap();
        let report = migrate(&store, &config).await.unwrap();
        assert_eq!(report.backend, "sqlite");
        close_store(&store).await;
    }

    #[tokio::test]
    async fn incident_commands_round_trip_lifecycle() {
        let (harness, _config) = setup().await;
        let store = harness.store();

        let opened = incident(store, open("r-1", "inc-1", 100)).await.unwrap();
        assert_eq!(opened.status, IncidentStatus::Opened);

        let closed = incident(
            store,
            IncidentAction::SetStatus {
                incident_id: "inc-1".into(),
                status: IncidentStatus::Closed,
            },
        )
        .await
        .unwrap();
        assert!(closed.end_time.is_some());

        let err = incident(
            store,
            IncidentAction::SetStatus {
                incident_id: "inc-1".into(),
                status: IncidentStatus::Opened,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            CliError::Tocsin(TocsinError::InvalidTransition { .. })
        ));

        let shown = incident(
            store,
            IncidentAction::Show {
                incident_id: "inc-1".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(shown.histories.len(), 2);
    }

    #[tokio::test]
    async fn list_filters_by_rule() {
        let (harness, _config) = setup().await;
        let store = harness.store();
        incident(store, open("r-1", "inc-1", 100)).await.unwrap();
        incident(store, open("r-2", "inc-2", 200)).await.unwrap();

        let mut args = list_args();
        args.rule = Some("r-2".into());
        let page = list_incidents(store, &args).await.unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].incident_id, "inc-2");

        args.limit = 0;
        assert!(matches!(
            list_incidents(store, &args).await,
            Err(CliError::Tocsin(TocsinError::InvalidRequest(_)))
        ));
    }

    #[tokio::test]
    async fn snapshot_commands() {
        let (harness, _config) = setup().await;
        let store = harness.store();
        for (ts, code) in [(10, SchedulerCode::Ok), (20, SchedulerCode::Error)] {
            snapshots(
                store,
                SnapshotAction::Record {
                    scheduler_id: "s-1".into(),
                    code,
                    error: None,
                    duration_ms: 40,
                    timestamp: Some(ts),
                },
            )
            .await
            .unwrap();
        }

        let listed = snapshots(
            store,
            SnapshotAction::List {
                scheduler_id: "s-1".into(),
                status: None,
                from: None,
                to: None,
                direction: SortDirection::Asc,
                page: 1,
                limit: 10,
            },
        )
        .await
        .unwrap();
        assert_eq!(listed["total_count"], 2);
        assert_eq!(listed["items"][0]["timestamp"], 10);

        let uptime = snapshots(
            store,
            SnapshotAction::Uptime {
                scheduler_id: "s-1".into(),
                from: None,
                to: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(uptime["uptime"], 0.5);
        assert_eq!(uptime["total"], 2);
    }

    #[tokio::test]
    async fn eval_reports_value_and_type() {
        let (harness, config) = setup().await;
        harness
            .seed_snapshots("s-1", &[(10, SchedulerCode::Error)])
            .await
            .unwrap();
        let output = eval(harness.store(), &config, "s-1", "count(last(5), {#.Code == Error})")
            .await
            .unwrap();
        assert_eq!(output.ty, "int");
        assert_eq!(output.value, Value::Int(1));
    }

    #[tokio::test]
    async fn eval_separates_compile_and_runtime_failures() {
        let (harness, config) = setup().await;
        let err = eval(harness.store(), &config, "s-1", "last(3) &&")
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Expression(_)));

        let err = eval(harness.store(), &config, "s-1", "last(1)[0].Code == Ok")
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Tocsin(TocsinError::Evaluation { .. })));
    }

    #[tokio::test]
    async fn reconcile_opens_incident_for_firing_rule() {
        let (harness, config) = setup().await;
        harness
            .seed_snapshots("s-1", &[(10, SchedulerCode::Error)])
            .await
            .unwrap();
        let rule = rule(
            "r-1".into(),
            "s-1".into(),
            "any(last(1), {#.Code == Error})".into(),
            false,
        )
        .unwrap();
        let outcome = reconcile(harness.store(), &config, rule).await.unwrap();
        assert!(matches!(outcome, Outcome::Opened(_)));

        assert!(matches!(
            super::rule("r-1".into(), "s-1".into(), "len(last(1))".into(), false),
            Err(CliError::Expression(_))
        ));
    }
}

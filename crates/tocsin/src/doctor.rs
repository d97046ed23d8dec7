// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tocsin doctor` command implementation.
//!
//! Checks that the configuration is valid and that the database is present,
//! reachable, migrated and intact. Never creates or modifies the database.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use tocsin_config::TocsinConfig;
use tocsin_core::{HealthStatus, StoreAdapter};
use tocsin_storage::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name,
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run every check, print a report and return the number of failed checks.
pub async fn run_doctor(config: &TocsinConfig, plain: bool) -> usize {
    let use_color = !plain && std::io::stdout().is_terminal();
    let results = collect_checks(config).await;

    println!();
    println!("  tocsin doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", render_line(result, use_color));
    }
    println!();

    let failures = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .count();
    let warnings = results
        .iter()
        .filter(|r| r.status == CheckStatus::Warn)
        .count();
    match failures + warnings {
        0 => println!("  All checks passed."),
        1 => println!("  1 issue found."),
        n => println!("  {n} issues found."),
    }
    println!();

    failures
}

async fn collect_checks(config: &TocsinConfig) -> Vec<CheckResult> {
    let mut results = vec![check_config(config), check_evaluator(config)];
    let db_path = &config.storage.database_path;

    if !Path::new(db_path).exists() {
        results.push(CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {db_path} (run `tocsin migrate`)"),
            Instant::now(),
        ));
        return results;
    }

    let start = Instant::now();
    let store = match SqliteStore::open(&config.storage).await {
        Ok(store) => store,
        Err(e) => {
            results.push(CheckResult::new(
                "Database",
                CheckStatus::Fail,
                format!("open failed: {e}"),
                start,
            ));
            return results;
        }
    };
    results.push(check_health(&store, start).await);
    results.push(check_schema(&store).await);
    results.push(check_integrity(&store).await);
    results
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    use colored::Colorize;

    let ms = result.duration.as_millis();
    let (symbol, message) = match (result.status, use_color) {
        (CheckStatus::Pass, true) => ("✓".green().to_string(), result.message.normal().to_string()),
        (CheckStatus::Warn, true) => ("!".yellow().to_string(), result.message.yellow().to_string()),
        (CheckStatus::Fail, true) => ("✗".red().to_string(), result.message.red().to_string()),
        (CheckStatus::Pass, false) => ("[OK]  ".to_string(), result.message.clone()),
        (CheckStatus::Warn, false) => ("[WARN]".to_string(), result.message.clone()),
        (CheckStatus::Fail, false) => ("[FAIL]".to_string(), result.message.clone()),
    };
    format!("    {symbol} {:<14} {message} ({ms}ms)", result.name)
}

fn check_config(config: &TocsinConfig) -> CheckResult {
    let start = Instant::now();
    match tocsin_config::validation::validate_config(config) {
        Ok(()) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

fn check_evaluator(config: &TocsinConfig) -> CheckResult {
    let start = Instant::now();
    match tocsin_expression::compile_rule("len(last(1)) >= 0") {
        Ok(_) => CheckResult::new(
            "Evaluator",
            CheckStatus::Pass,
            format!(
                "max window {}, timeout {}ms",
                config.evaluator.max_window, config.evaluator.evaluation_timeout_ms
            ),
            start,
        ),
        Err(e) => CheckResult::new("Evaluator", CheckStatus::Fail, e.to_string(), start),
    }
}

async fn check_health(store: &SqliteStore, start: Instant) -> CheckResult {
    match store.health_check().await {
        Ok(HealthStatus::Healthy) => CheckResult::new("Database", CheckStatus::Pass, "connected", start),
        Ok(HealthStatus::Degraded(reason)) => {
            CheckResult::new("Database", CheckStatus::Warn, reason, start)
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            CheckResult::new("Database", CheckStatus::Fail, reason, start)
        }
        Err(e) => CheckResult::new("Database", CheckStatus::Fail, e.to_string(), start),
    }
}

async fn check_schema(store: &SqliteStore) -> CheckResult {
    let start = Instant::now();
    let version = store
        .database()
        .connection()
        .call(|conn| -> Result<Option<i64>, rusqlite::Error> {
            let has_history: bool = conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM sqlite_master \
                 WHERE type = 'table' AND name = 'refinery_schema_history')",
                [],
                |row| row.get(0),
            )?;
            if !has_history {
                return Ok(None);
            }
            conn.query_row(
                "SELECT MAX(version) FROM refinery_schema_history",
                [],
                |row| row.get(0),
            )
        })
        .await;

    match version {
        Ok(Some(v)) => CheckResult::new("Schema", CheckStatus::Pass, format!("version {v}"), start),
        Ok(None) => CheckResult::new(
            "Schema",
            CheckStatus::Warn,
            "not migrated (run `tocsin migrate`)",
            start,
        ),
        Err(e) => CheckResult::new("Schema", CheckStatus::Fail, format!("query failed: {e}"), start),
    }
}

async fn check_integrity(store: &SqliteStore) -> CheckResult {
    let start = Instant::now();
    let rows = store
        .database()
        .connection()
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            stmt.query_map([], |row| row.get(0))?.collect()
        })
        .await;

    match rows {
        Ok(rows) if rows.len() == 1 && rows[0] == "ok" => {
            CheckResult::new("Integrity", CheckStatus::Pass, "ok", start)
        }
        Ok(rows) => CheckResult::new(
            "Integrity",
            CheckStatus::Fail,
            format!("{} issue(s) found", rows.len()),
            start,
        ),
        Err(e) => CheckResult::new("Integrity", CheckStatus::Fail, format!("check failed: {e}"), start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tocsin_test_utils::TestHarness;

    fn status_of<'a>(results: &'a [CheckResult], name: &str) -> &'a CheckResult {
        results.iter().find(|r| r.name == name).unwrap()
    }

    #[tokio::test]
    async fn missing_database_warns_without_creating_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TocsinConfig::default();
        config.storage.database_path = dir.path().join("absent.db").display().to_string();

        let results = collect_checks(&config).await;
        let db = status_of(&results, "Database");
        assert_eq!(db.status, CheckStatus::Warn);
        assert!(db.message.contains("not found"));
        assert!(!dir.path().join("absent.db").exists());
    }

    #[tokio::test]
    async fn migrated_database_passes_every_check() {
        let harness = TestHarness::builder().build().await.unwrap();
        let config = TocsinConfig {
            storage: harness.storage_config().clone(),
            ..TocsinConfig::default()
        };

        let results = collect_checks(&config).await;
        assert_eq!(results.len(), 5);
        for result in &results {
            assert_eq!(result.status, CheckStatus::Pass, "{}: {}", result.name, result.message);
        }
        assert!(status_of(&results, "Schema").message.starts_with("version"));
    }

    #[tokio::test]
    async fn unmigrated_database_warns_on_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.db");
        std::fs::File::create(&path).unwrap();
        let mut config = TocsinConfig::default();
        config.storage.database_path = path.display().to_string();

        let results = collect_checks(&config).await;
        assert_eq!(status_of(&results, "Schema").status, CheckStatus::Warn);
    }

    #[test]
    fn invalid_config_fails() {
        let mut config = TocsinConfig::default();
        config.evaluator.max_window = 0;
        assert_eq!(check_config(&config).status, CheckStatus::Fail);
    }

    #[test]
    fn plain_rendering_uses_tags() {
        let result = CheckResult {
            name: "Schema",
            status: CheckStatus::Warn,
            message: "not migrated".into(),
            duration: Duration::from_millis(3),
        };
        let line = render_line(&result, false);
        assert!(line.contains("[WARN]"));
        assert!(line.contains("not migrated (3ms)"));
    }
}

// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduler snapshot operations.

use rusqlite::{Row, params, params_from_iter};
use tocsin_core::types::{Page, SchedulerSnapshot, SchedulerUptime, SnapshotQuery, TimeRange};
use tocsin_core::{SchedulerCode, TocsinError};

use crate::database::{Database, map_tr_err};
use crate::query;
use crate::queries::{capture_now, read_page, unknown_code};

/// Record one scheduler observation.
pub async fn insert_snapshot(db: &Database, snapshot: &SchedulerSnapshot) -> Result<(), TocsinError> {
    if snapshot.scheduler_id.is_empty() {
        return Err(TocsinError::InvalidRequest(
            "scheduler_id must not be empty".into(),
        ));
    }
    let snapshot = snapshot.clone();
    let (_, now) = capture_now();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO scheduler_snapshots
                     (scheduler_id, code, error_message, duration_ms, timestamp, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    snapshot.scheduler_id,
                    snapshot.code.code(),
                    snapshot.error_message,
                    snapshot.duration_ms,
                    snapshot.timestamp,
                    now
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// One page of a scheduler's snapshots and the total under the same filters.
pub async fn get_snapshots(
    db: &Database,
    request: &SnapshotQuery,
) -> Result<Page<SchedulerSnapshot>, TocsinError> {
    let query = query::snapshot_list(request)?;
    db.connection()
        .call(move |conn| -> Result<Page<SchedulerSnapshot>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let (items, total_count) = read_page(&tx, &query, row_to_snapshot)?;
            tx.commit()?;
            Ok(Page { items, total_count })
        })
        .await
        .map_err(map_tr_err)
}

/// Share of `OK` snapshots and mean duration over `time_range`.
///
/// A scheduler with no matching snapshots reports zero for all fields.
pub async fn get_scheduler_uptime(
    db: &Database,
    scheduler_id: &str,
    time_range: Option<TimeRange>,
) -> Result<SchedulerUptime, TocsinError> {
    let query = query::scheduler_uptime(scheduler_id, time_range)?;
    let (total, ok, avg_latency_ms) = db
        .connection()
        .call(move |conn| -> Result<(i64, i64, f64), rusqlite::Error> {
            conn.query_row(&query.sql, params_from_iter(query.params.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
        })
        .await
        .map_err(map_tr_err)?;

    let uptime = if total > 0 {
        ok as f64 / total as f64
    } else {
        0.0
    };
    Ok(SchedulerUptime {
        uptime,
        avg_latency_ms,
        total: u64::try_from(total).unwrap_or(0),
    })
}

fn row_to_snapshot(row: &Row<'_>) -> rusqlite::Result<SchedulerSnapshot> {
    let code: i32 = row.get(1)?;
    Ok(SchedulerSnapshot {
        scheduler_id: row.get(0)?,
        code: SchedulerCode::from_code(code)
            .ok_or_else(|| unknown_code(1, "scheduler", code))?,
        error_message: row.get(2)?,
        duration_ms: row.get(3)?,
        timestamp: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tocsin_core::types::{Pagination, SortDirection};

    fn snapshot(scheduler: &str, code: SchedulerCode, timestamp: i64, duration_ms: i64) -> SchedulerSnapshot {
        SchedulerSnapshot {
            scheduler_id: scheduler.to_string(),
            code,
            error_message: (code == SchedulerCode::Error).then(|| "check failed".to_string()),
            duration_ms,
            timestamp,
        }
    }

    async fn setup() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn timestamps(page: &Page<SchedulerSnapshot>) -> Vec<i64> {
        page.items.iter().map(|s| s.timestamp).collect()
    }

    #[tokio::test]
    async fn windows_follow_direction_and_page() {
        let db = setup().await;
        for ts in [10, 20, 30] {
            insert_snapshot(&db, &snapshot("s1", SchedulerCode::Ok, ts, 5))
                .await
                .unwrap();
        }
        insert_snapshot(&db, &snapshot("other", SchedulerCode::Ok, 25, 5))
            .await
            .unwrap();

        let mut req = SnapshotQuery::new("s1");
        req.pagination = Pagination::new(1, 2);
        let last = get_snapshots(&db, &req).await.unwrap();
        assert_eq!(timestamps(&last), [30, 20]);
        assert_eq!(last.total_count, 3);

        req.direction = SortDirection::Asc;
        assert_eq!(timestamps(&get_snapshots(&db, &req).await.unwrap()), [10, 20]);

        req.pagination = Pagination::new(2, 1);
        assert_eq!(timestamps(&get_snapshots(&db, &req).await.unwrap()), [20]);
    }

    #[tokio::test]
    async fn equal_timestamps_keep_insertion_order() {
        let db = setup().await;
        insert_snapshot(&db, &snapshot("s1", SchedulerCode::Ok, 10, 1))
            .await
            .unwrap();
        insert_snapshot(&db, &snapshot("s1", SchedulerCode::Error, 10, 2))
            .await
            .unwrap();

        let mut req = SnapshotQuery::new("s1");
        req.direction = SortDirection::Asc;
        let page = get_snapshots(&db, &req).await.unwrap();
        let durations: Vec<_> = page.items.iter().map(|s| s.duration_ms).collect();
        assert_eq!(durations, [1, 2]);
    }

    #[tokio::test]
    async fn code_and_time_filters_apply() {
        let db = setup().await;
        for (ts, code) in [
            (10, SchedulerCode::Ok),
            (20, SchedulerCode::Error),
            (30, SchedulerCode::Error),
            (40, SchedulerCode::Ok),
        ] {
            insert_snapshot(&db, &snapshot("s1", code, ts, 0)).await.unwrap();
        }

        let mut req = SnapshotQuery::new("s1");
        req.status = Some(SchedulerCode::Error);
        let page = get_snapshots(&db, &req).await.unwrap();
        assert_eq!(timestamps(&page), [30, 20]);
        assert_eq!(page.items[0].error_message.as_deref(), Some("check failed"));

        req.status = None;
        req.time_range = Some(TimeRange::between(15, 35));
        let page = get_snapshots(&db, &req).await.unwrap();
        assert_eq!(page.total_count, 2);
    }

    #[tokio::test]
    async fn uptime_over_range() {
        let db = setup().await;
        for (ts, code, d) in [
            (10, SchedulerCode::Ok, 10),
            (20, SchedulerCode::Error, 30),
            (30, SchedulerCode::Ok, 20),
            (40, SchedulerCode::Ok, 40),
        ] {
            insert_snapshot(&db, &snapshot("s1", code, ts, d)).await.unwrap();
        }

        let all = get_scheduler_uptime(&db, "s1", None).await.unwrap();
        assert_eq!(all.total, 4);
        assert!((all.uptime - 0.75).abs() < f64::EPSILON);
        assert!((all.avg_latency_ms - 25.0).abs() < f64::EPSILON);

        let empty = get_scheduler_uptime(&db, "s1", Some(TimeRange::between(100, 200)))
            .await
            .unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.uptime, 0.0);
        assert_eq!(empty.avg_latency_ms, 0.0);
    }

    #[tokio::test]
    async fn empty_scheduler_id_is_rejected() {
        let db = setup().await;
        let err = insert_snapshot(&db, &snapshot("", SchedulerCode::Ok, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, TocsinError::InvalidRequest(_)));
    }
}

// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query builder for filtered, sorted, paginated reads.
//!
//! Each request compiles into a page query and a count query that share the
//! same WHERE clause. Filter values are always bound as numbered parameters;
//! column names and sort directions come from fixed whitelists and are the
//! only text spliced into the SQL.

use rusqlite::types::Value;
use tocsin_core::types::{
    IncidentListRequest, IncidentSortBy, SchedulerCode, SnapshotQuery, SortDirection, TimeRange,
};
use tocsin_core::{IncidentStatus, TocsinError};

/// Column list selected for an incident row, in `row_to_incident` order.
pub(crate) const INCIDENT_COLUMNS: &str =
    "id, incident_id, status, rule_id, start_time, end_time, created_at, updated_at";

/// Column list selected for a snapshot row, in `row_to_snapshot` order.
pub(crate) const SNAPSHOT_COLUMNS: &str =
    "scheduler_id, code, error_message, duration_ms, timestamp";

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// A page query and the count query over the same filters.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedQuery {
    pub page: SqlQuery,
    pub count: SqlQuery,
}

/// Accumulates `column op ?N` clauses joined by AND.
#[derive(Debug, Default)]
struct WhereBuilder {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl WhereBuilder {
    fn push(&mut self, column: &'static str, op: &'static str, value: Value) {
        self.params.push(value);
        self.clauses
            .push(format!("{column} {op} ?{}", self.params.len()));
    }

    fn time_range(&mut self, column: &'static str, range: Option<TimeRange>) {
        let Some(range) = range else { return };
        if let Some(from) = range.from {
            self.push(column, ">=", Value::Integer(from));
        }
        if let Some(to) = range.to {
            self.push(column, "<=", Value::Integer(to));
        }
    }

    fn clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Finish into a count query and a page query with LIMIT/OFFSET appended.
    fn finish(self, table: &str, columns: &str, order_by: String, limit: u32, offset: u64) -> PagedQuery {
        let where_clause = self.clause();
        let count = SqlQuery {
            sql: format!("SELECT COUNT(*) FROM {table}{where_clause}"),
            params: self.params.clone(),
        };

        let mut params = self.params;
        let limit_idx = params.len() + 1;
        let offset_idx = params.len() + 2;
        params.push(Value::Integer(i64::from(limit)));
        params.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));

        let page = SqlQuery {
            sql: format!(
                "SELECT {columns} FROM {table}{where_clause} ORDER BY {order_by} \
                 LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
            ),
            params,
        };
        PagedQuery { page, count }
    }
}

fn direction_sql(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    }
}

fn incident_sort_column(by: IncidentSortBy) -> &'static str {
    match by {
        IncidentSortBy::StartTime => "start_time",
        IncidentSortBy::EndTime => "end_time",
    }
}

/// Compile an incident list request.
///
/// Rejects `page < 1` and `limit < 1`. A missing sort orders by start time
/// descending; ties fall back to insertion order in the same direction.
pub fn incident_list(request: &IncidentListRequest) -> Result<PagedQuery, TocsinError> {
    request.pagination.validate()?;

    let mut builder = WhereBuilder::default();
    if let Some(status) = request.status.filter(|s| *s != IncidentStatus::Unspecified) {
        builder.push("status", "=", Value::Integer(i64::from(status.code())));
    }
    if let Some(rule_id) = request.rule_id.as_deref().filter(|r| !r.is_empty()) {
        builder.push("rule_id", "=", Value::Text(rule_id.to_string()));
    }
    builder.time_range("start_time", request.time_range);

    let sort = request.sort.unwrap_or_default();
    let dir = direction_sql(sort.direction);
    let order_by = format!("{} {dir}, rowid {dir}", incident_sort_column(sort.by));

    Ok(builder.finish(
        "incidents",
        INCIDENT_COLUMNS,
        order_by,
        request.pagination.limit,
        request.pagination.offset(),
    ))
}

/// Compile a snapshot window request for one scheduler.
pub fn snapshot_list(query: &SnapshotQuery) -> Result<PagedQuery, TocsinError> {
    query.pagination.validate()?;
    let builder = snapshot_filters(&query.scheduler_id, query.status, query.time_range)?;

    let dir = direction_sql(query.direction);
    let order_by = format!("timestamp {dir}, id {dir}");

    Ok(builder.finish(
        "scheduler_snapshots",
        SNAPSHOT_COLUMNS,
        order_by,
        query.pagination.limit,
        query.pagination.offset(),
    ))
}

/// Aggregate query for scheduler uptime: `(total, ok_count, avg_duration)`.
pub fn scheduler_uptime(
    scheduler_id: &str,
    time_range: Option<TimeRange>,
) -> Result<SqlQuery, TocsinError> {
    let mut builder = snapshot_filters(scheduler_id, None, time_range)?;
    let where_clause = builder.clause();
    builder
        .params
        .push(Value::Integer(i64::from(SchedulerCode::Ok.code())));
    let ok_idx = builder.params.len();
    Ok(SqlQuery {
        sql: format!(
            "SELECT COUNT(*), \
                    COALESCE(SUM(CASE WHEN code = ?{ok_idx} THEN 1 ELSE 0 END), 0), \
                    COALESCE(AVG(duration_ms), 0.0) \
             FROM scheduler_snapshots{where_clause}"
        ),
        params: builder.params,
    })
}

fn snapshot_filters(
    scheduler_id: &str,
    status: Option<SchedulerCode>,
    time_range: Option<TimeRange>,
) -> Result<WhereBuilder, TocsinError> {
    if scheduler_id.is_empty() {
        return Err(TocsinError::InvalidRequest(
            "scheduler_id must not be empty".into(),
        ));
    }
    let mut builder = WhereBuilder::default();
    builder.push("scheduler_id", "=", Value::Text(scheduler_id.to_string()));
    if let Some(code) = status.filter(|c| *c != SchedulerCode::Unspecified) {
        builder.push("code", "=", Value::Integer(i64::from(code.code())));
    }
    builder.time_range("timestamp", time_range);
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tocsin_core::types::{IncidentSort, Pagination};

    #[test]
    fn empty_request_has_no_where_and_default_order() {
        let q = incident_list(&IncidentListRequest::default()).unwrap();
        assert_eq!(q.count.sql, "SELECT COUNT(*) FROM incidents");
        assert!(q.count.params.is_empty());
        assert!(
            q.page
                .sql
                .contains("ORDER BY start_time DESC, rowid DESC LIMIT ?1 OFFSET ?2"),
            "{}",
            q.page.sql
        );
        assert_eq!(q.page.params, vec![Value::Integer(50), Value::Integer(0)]);
    }

    #[test]
    fn filter_values_are_bound_never_interpolated() {
        let hostile = "x' OR '1'='1";
        let request = IncidentListRequest {
            status: Some(IncidentStatus::Opened),
            rule_id: Some(hostile.to_string()),
            time_range: Some(TimeRange::between(100, 200)),
            ..Default::default()
        };
        let q = incident_list(&request).unwrap();
        assert!(!q.page.sql.contains(hostile));
        assert!(!q.count.sql.contains(hostile));
        assert_eq!(
            q.count.sql,
            "SELECT COUNT(*) FROM incidents WHERE status = ?1 AND rule_id = ?2 \
             AND start_time >= ?3 AND start_time <= ?4"
        );
        assert_eq!(
            q.count.params,
            vec![
                Value::Integer(1),
                Value::Text(hostile.to_string()),
                Value::Integer(100),
                Value::Integer(200),
            ]
        );
        assert!(q.page.sql.ends_with("LIMIT ?5 OFFSET ?6"));
    }

    #[test]
    fn unspecified_status_disables_filter() {
        let request = IncidentListRequest {
            status: Some(IncidentStatus::Unspecified),
            ..Default::default()
        };
        let q = incident_list(&request).unwrap();
        assert!(!q.count.sql.contains("status"));
    }

    #[test]
    fn sort_by_end_time_ascending() {
        let request = IncidentListRequest {
            sort: Some(IncidentSort {
                by: IncidentSortBy::from_code(2),
                direction: SortDirection::from_code(1),
            }),
            pagination: Pagination::new(3, 10),
            ..Default::default()
        };
        let q = incident_list(&request).unwrap();
        assert!(q.page.sql.contains("ORDER BY end_time ASC, rowid ASC"));
        assert_eq!(q.page.params, vec![Value::Integer(10), Value::Integer(20)]);
    }

    #[test]
    fn invalid_pagination_is_rejected() {
        let request = IncidentListRequest {
            pagination: Pagination::new(0, 10),
            ..Default::default()
        };
        assert!(matches!(
            incident_list(&request),
            Err(TocsinError::InvalidRequest(_))
        ));
    }

    #[test]
    fn snapshot_query_orders_by_timestamp_then_insertion() {
        let mut query = SnapshotQuery::new("sched-1");
        query.status = Some(SchedulerCode::Error);
        query.direction = SortDirection::Asc;
        query.time_range = Some(TimeRange::default().refine_from(5));
        let q = snapshot_list(&query).unwrap();
        assert_eq!(
            q.count.sql,
            "SELECT COUNT(*) FROM scheduler_snapshots WHERE scheduler_id = ?1 AND code = ?2 \
             AND timestamp >= ?3"
        );
        assert!(q.page.sql.contains("ORDER BY timestamp ASC, id ASC"));
        assert_eq!(q.page.params.len(), 5);
    }

    #[test]
    fn snapshot_query_requires_scheduler() {
        assert!(matches!(
            snapshot_list(&SnapshotQuery::new("")),
            Err(TocsinError::InvalidRequest(_))
        ));
    }

    #[test]
    fn uptime_binds_ok_code_after_filters() {
        let q = scheduler_uptime("s", Some(TimeRange::between(1, 2))).unwrap();
        assert!(q.sql.contains("code = ?4"));
        assert_eq!(q.params.last(), Some(&Value::Integer(1)));
    }

    proptest::proptest! {
        #[test]
        fn page_window_follows_offset_arithmetic(
            page in 1u32..10_000,
            limit in 1u32..1_000,
            rule_id in "[a-zA-Z0-9' ;-]{1,24}",
        ) {
            let request = IncidentListRequest {
                rule_id: Some(rule_id.clone()),
                pagination: Pagination::new(page, limit),
                ..Default::default()
            };
            let q = incident_list(&request).unwrap();
            let expected_offset = i64::from(page - 1) * i64::from(limit);
            proptest::prop_assert_eq!(
                &q.page.params[q.page.params.len() - 2..],
                &[Value::Integer(i64::from(limit)), Value::Integer(expected_offset)][..]
            );
            proptest::prop_assert_eq!(&q.count.params[..], &[Value::Text(rule_id)][..]);
        }
    }
}

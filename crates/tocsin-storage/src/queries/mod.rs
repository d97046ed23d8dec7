// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for incident and snapshot operations.

pub mod incidents;
pub mod snapshots;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, Row, params_from_iter};

use crate::query::PagedQuery;

/// One wall-clock instant per write: `(unix_ms, rfc3339)`.
pub(crate) fn capture_now() -> (i64, String) {
    let now = Utc::now();
    (
        now.timestamp_millis(),
        now.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// Run the count and page halves of `query` on `conn`.
///
/// Callers wrap this in a transaction so both halves see one snapshot.
pub(crate) fn read_page<T>(
    conn: &Connection,
    query: &PagedQuery,
    map_row: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<(Vec<T>, u64)> {
    let total: i64 = conn.query_row(
        &query.count.sql,
        params_from_iter(query.count.params.iter()),
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&query.page.sql)?;
    let items = stmt
        .query_map(params_from_iter(query.page.params.iter()), map_row)?
        .collect::<rusqlite::Result<Vec<T>>>()?;

    Ok((items, u64::try_from(total).unwrap_or(0)))
}

/// Conversion failure for a stored enum code this build does not know.
pub(crate) fn unknown_code(column: usize, kind: &str, code: i32) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Integer,
        format!("unknown {kind} code {code}").into(),
    )
}

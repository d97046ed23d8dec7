// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incident and incident-history operations.
//!
//! Writes run in `BEGIN IMMEDIATE` transactions so the incident row and its
//! history row become visible together, and so the active-incident check
//! and the insert cannot interleave with another writer.

use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tocsin_core::lifecycle::plan_transition;
use tocsin_core::types::{IncidentListRequest, Page};
use tocsin_core::{Incident, IncidentHistory, IncidentStatus, NewIncident, TocsinError};

use crate::database::{Database, TxError, map_tr_err, map_tx_err};
use crate::query::{self, INCIDENT_COLUMNS};
use crate::queries::{capture_now, read_page, unknown_code};

/// Insert an `OPENED` incident and its initial history row atomically.
///
/// The history row is stamped with the incident's `start_time`. Fails with
/// `AlreadyExists` for a duplicate `incident_id` and `IntegrityViolation` if
/// the rule already has an active incident.
pub async fn insert_incident(db: &Database, new: &NewIncident) -> Result<Incident, TocsinError> {
    if new.incident_id.is_empty() {
        return Err(TocsinError::InvalidRequest(
            "incident_id must not be empty".into(),
        ));
    }
    if new.rule_id.is_empty() {
        return Err(TocsinError::InvalidRequest("rule_id must not be empty".into()));
    }
    if new.status != IncidentStatus::Opened {
        return Err(TocsinError::InvalidRequest(format!(
            "new incidents must start as OPENED, got {}",
            new.status
        )));
    }

    let new = new.clone();
    let (_, now) = capture_now();
    db.connection()
        .call(move |conn| -> Result<Incident, TxError> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM incidents WHERE incident_id = ?1)",
                params![new.incident_id],
                |row| row.get(0),
            )?;
            if exists {
                return Err(TxError::Rejected(TocsinError::AlreadyExists {
                    entity: "incident",
                    id: new.incident_id,
                }));
            }

            if let Some(active) = active_incident_ids(&tx, &new.rule_id, 1)?.into_iter().next() {
                return Err(TxError::Rejected(TocsinError::IntegrityViolation(format!(
                    "rule {} already has active incident {active}",
                    new.rule_id
                ))));
            }

            let id = uuid::Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO incidents
                     (id, created_at, updated_at, incident_id, status, rule_id, start_time, end_time)
                 VALUES (?1, ?2, ?2, ?3, ?4, ?5, ?6, NULL)",
                params![
                    id,
                    now,
                    new.incident_id,
                    new.status.code(),
                    new.rule_id,
                    new.start_time
                ],
            )?;
            let history = insert_history(&tx, &new.incident_id, new.status, new.start_time, &now)?;
            tx.commit()?;

            Ok(Incident {
                id,
                incident_id: new.incident_id,
                status: new.status,
                rule_id: new.rule_id,
                start_time: new.start_time,
                end_time: None,
                created_at: now.clone(),
                updated_at: now,
                histories: vec![history],
            })
        })
        .await
        .map_err(map_tx_err)
}

/// Move an incident to `status`, appending one history row.
///
/// `end_time` is set to the transition timestamp only when closing.
pub async fn update_incident_status(
    db: &Database,
    incident_id: &str,
    status: IncidentStatus,
) -> Result<Incident, TocsinError> {
    let incident_id = incident_id.to_string();
    let (now_ms, now) = capture_now();
    db.connection()
        .call(move |conn| -> Result<Incident, TxError> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(current) = load_incident_row(&tx, &incident_id)? else {
                return Err(TxError::Rejected(TocsinError::not_found(
                    "incident",
                    incident_id,
                )));
            };
            let effect = plan_transition(current.status, status, current.start_time, now_ms)
                .map_err(TxError::Rejected)?;

            tx.execute(
                "UPDATE incidents SET status = ?1, updated_at = ?2, end_time = ?3
                 WHERE incident_id = ?4",
                params![effect.status.code(), now, effect.end_time, incident_id],
            )?;
            insert_history(&tx, &incident_id, effect.status, effect.history_timestamp, &now)?;

            let histories = load_histories(&tx, &incident_id)?;
            tx.commit()?;

            Ok(Incident {
                status: effect.status,
                end_time: effect.end_time,
                updated_at: now,
                histories,
                ..current
            })
        })
        .await
        .map_err(map_tx_err)
}

/// Fetch an incident with its histories, or `NotFound`.
pub async fn get_incident_by_id(db: &Database, incident_id: &str) -> Result<Incident, TocsinError> {
    let id = incident_id.to_string();
    let found = db
        .connection()
        .call(move |conn| -> Result<Option<Incident>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let incident = match load_incident_row(&tx, &id)? {
                Some(row) => Some(with_histories(&tx, row)?),
                None => None,
            };
            tx.commit()?;
            Ok(incident)
        })
        .await
        .map_err(map_tr_err)?;
    found.ok_or_else(|| TocsinError::not_found("incident", incident_id))
}

/// Fetch the single active incident of a rule.
///
/// More than one active row is reported as `IntegrityViolation`, never
/// resolved by picking one.
pub async fn get_active_incident_by_rule_id(
    db: &Database,
    rule_id: &str,
) -> Result<Incident, TocsinError> {
    let rule = rule_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Incident, TxError> {
            let tx = conn.transaction()?;
            let ids = active_incident_ids(&tx, &rule, 2)?;
            let incident_id = match ids.as_slice() {
                [] => {
                    return Err(TxError::Rejected(TocsinError::not_found(
                        "active incident for rule",
                        rule,
                    )));
                }
                [single] => single.clone(),
                [first, second, ..] => {
                    return Err(TxError::Rejected(TocsinError::IntegrityViolation(format!(
                        "rule {rule} has more than one active incident ({first}, {second})"
                    ))));
                }
            };
            let row = load_incident_row(&tx, &incident_id)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            let incident = with_histories(&tx, row)?;
            tx.commit()?;
            Ok(incident)
        })
        .await
        .map_err(map_tx_err)
}

/// One page of incidents plus the total count, read from one snapshot.
pub async fn get_incidents(
    db: &Database,
    request: &IncidentListRequest,
) -> Result<Page<Incident>, TocsinError> {
    let query = query::incident_list(request)?;
    db.connection()
        .call(move |conn| -> Result<Page<Incident>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let (rows, total_count) = read_page(&tx, &query, row_to_incident)?;
            let items = rows
                .into_iter()
                .map(|row| with_histories(&tx, row))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            tx.commit()?;
            Ok(Page { items, total_count })
        })
        .await
        .map_err(map_tr_err)
}

// --- Row helpers (run on the connection thread) ---

fn active_incident_ids(
    conn: &Connection,
    rule_id: &str,
    limit: i64,
) -> rusqlite::Result<Vec<String>> {
    let [a, b, c] = IncidentStatus::ACTIVE.map(IncidentStatus::code);
    let mut stmt = conn.prepare(
        "SELECT incident_id FROM incidents
         WHERE rule_id = ?1 AND status IN (?2, ?3, ?4)
         ORDER BY start_time DESC, rowid DESC
         LIMIT ?5",
    )?;
    stmt.query_map(params![rule_id, a, b, c, limit], |row| row.get(0))?
        .collect()
}

fn insert_history(
    conn: &Connection,
    incident_id: &str,
    status: IncidentStatus,
    timestamp: i64,
    now: &str,
) -> rusqlite::Result<IncidentHistory> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO incidents_history (id, created_at, incident_id, status, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, now, incident_id, status.code(), timestamp],
    )?;
    Ok(IncidentHistory {
        id,
        incident_id: incident_id.to_string(),
        status,
        timestamp,
        created_at: now.to_string(),
    })
}

fn load_incident_row(conn: &Connection, incident_id: &str) -> rusqlite::Result<Option<Incident>> {
    conn.query_row(
        &format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE incident_id = ?1"),
        params![incident_id],
        row_to_incident,
    )
    .optional()
}

fn with_histories(conn: &Connection, incident: Incident) -> rusqlite::Result<Incident> {
    let histories = load_histories(conn, &incident.incident_id)?;
    Ok(Incident {
        histories,
        ..incident
    })
}

fn load_histories(conn: &Connection, incident_id: &str) -> rusqlite::Result<Vec<IncidentHistory>> {
    let mut stmt = conn.prepare(
        "SELECT id, incident_id, status, timestamp, created_at
         FROM incidents_history
         WHERE incident_id = ?1
         ORDER BY timestamp ASC, rowid ASC",
    )?;
    stmt.query_map(params![incident_id], |row| {
        let code: i32 = row.get(2)?;
        Ok(IncidentHistory {
            id: row.get(0)?,
            incident_id: row.get(1)?,
            status: IncidentStatus::from_code(code)
                .ok_or_else(|| unknown_code(2, "incident status", code))?,
            timestamp: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?
    .collect()
}

/// Map a row selected with [`INCIDENT_COLUMNS`]. Histories are left empty.
fn row_to_incident(row: &Row<'_>) -> rusqlite::Result<Incident> {
    let code: i32 = row.get(2)?;
    Ok(Incident {
        id: row.get(0)?,
        incident_id: row.get(1)?,
        status: IncidentStatus::from_code(code)
            .ok_or_else(|| unknown_code(2, "incident status", code))?,
        rule_id: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        histories: Vec::new(),
    })
}

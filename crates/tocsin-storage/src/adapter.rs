// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the store traits.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use tocsin_config::model::StorageConfig;
use tocsin_core::types::{
    IncidentListRequest, Page, SchedulerSnapshot, SchedulerUptime, SnapshotQuery, TimeRange,
};
use tocsin_core::{
    ErrorClass, HealthStatus, Incident, IncidentStatus, IncidentStore, NewIncident, SnapshotSource,
    SnapshotStore, StoreAdapter, TocsinError,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// Default per-call deadline when none is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed incident and snapshot store.
///
/// Every call runs under the handle's deadline and logs failures with the
/// operation name and the identifier it concerned before returning them.
/// Clones share the underlying connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
    timeout: Duration,
}

impl SqliteStore {
    /// Open the configured database. Migrations are not applied.
    pub async fn open(config: &StorageConfig) -> Result<Self, TocsinError> {
        let db = Database::open_with(config).await?;
        Ok(Self {
            db,
            timeout: config.query_timeout(),
        })
    }

    /// Wrap an already opened database with the default deadline.
    pub fn from_database(db: Database) -> Self {
        Self {
            db,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A handle sharing this connection with a different per-call deadline.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            db: self.db.clone(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn guarded<T, F>(&self, op: &'static str, subject: &str, fut: F) -> Result<T, TocsinError>
    where
        F: Future<Output = Result<T, TocsinError>>,
    {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(TocsinError::Timeout {
                duration: self.timeout,
            }),
        };
        match &result {
            Ok(_) => debug!(op, id = subject, "store call succeeded"),
            Err(e) => log_failure(op, subject, e),
        }
        result
    }
}

fn log_failure(op: &'static str, subject: &str, err: &TocsinError) {
    match err.class() {
        ErrorClass::NotFound => debug!(op, id = subject, error = %err, "store lookup missed"),
        ErrorClass::Client => warn!(op, id = subject, error = %err, "store call rejected"),
        ErrorClass::Server => error!(op, id = subject, error = %err, "store call failed"),
    }
}

#[async_trait]
impl StoreAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, TocsinError> {
        let probe = self.db.connection().call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch("SELECT 1;")?;
            Ok(())
        });
        match self
            .guarded("health_check", "", async { probe.await.map_err(map_tr_err) })
            .await
        {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(TocsinError::Timeout { duration }) => Ok(HealthStatus::Degraded(format!(
                "probe exceeded {duration:?}"
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), TocsinError> {
        self.guarded("shutdown", "", self.db.checkpoint()).await
    }
}

#[async_trait]
impl IncidentStore for SqliteStore {
    async fn migrate(&self) -> Result<(), TocsinError> {
        self.guarded("migrate", "", self.db.migrate()).await
    }

    async fn insert_incident(&self, incident: &NewIncident) -> Result<Incident, TocsinError> {
        let inserted = self
            .guarded(
                "insert_incident",
                &incident.incident_id,
                queries::incidents::insert_incident(&self.db, incident),
            )
            .await?;
        debug!(
            incident_id = %inserted.incident_id,
            rule_id = %inserted.rule_id,
            "incident opened"
        );
        Ok(inserted)
    }

    async fn update_incident_status(
        &self,
        incident_id: &str,
        status: IncidentStatus,
    ) -> Result<Incident, TocsinError> {
        let updated = self
            .guarded(
                "update_incident_status",
                incident_id,
                queries::incidents::update_incident_status(&self.db, incident_id, status),
            )
            .await?;
        debug!(incident_id, status = %updated.status, "incident status changed");
        Ok(updated)
    }

    async fn get_incident_by_id(&self, incident_id: &str) -> Result<Incident, TocsinError> {
        self.guarded(
            "get_incident_by_id",
            incident_id,
            queries::incidents::get_incident_by_id(&self.db, incident_id),
        )
        .await
    }

    async fn get_active_incident_by_rule_id(
        &self,
        rule_id: &str,
    ) -> Result<Incident, TocsinError> {
        self.guarded(
            "get_active_incident_by_rule_id",
            rule_id,
            queries::incidents::get_active_incident_by_rule_id(&self.db, rule_id),
        )
        .await
    }

    async fn get_incidents(
        &self,
        request: &IncidentListRequest,
    ) -> Result<Page<Incident>, TocsinError> {
        let subject = request.rule_id.as_deref().unwrap_or_default();
        self.guarded(
            "get_incidents",
            subject,
            queries::incidents::get_incidents(&self.db, request),
        )
        .await
    }
}

#[async_trait]
impl SnapshotSource for SqliteStore {
    async fn get_snapshots(
        &self,
        query: &SnapshotQuery,
    ) -> Result<Page<SchedulerSnapshot>, TocsinError> {
        self.guarded(
            "get_snapshots",
            &query.scheduler_id,
            queries::snapshots::get_snapshots(&self.db, query),
        )
        .await
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn insert_snapshot(&self, snapshot: &SchedulerSnapshot) -> Result<(), TocsinError> {
        self.guarded(
            "insert_snapshot",
            &snapshot.scheduler_id,
            queries::snapshots::insert_snapshot(&self.db, snapshot),
        )
        .await
    }

    async fn get_scheduler_uptime(
        &self,
        scheduler_id: &str,
        time_range: Option<TimeRange>,
    ) -> Result<SchedulerUptime, TocsinError> {
        self.guarded(
            "get_scheduler_uptime",
            scheduler_id,
            queries::snapshots::get_scheduler_uptime(&self.db, scheduler_id, time_range),
        )
        .await
    }
}

// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-database test harness.
//!
//! [`TestHarness::builder()`] opens a migrated SQLite store inside a fresh
//! temp directory. The directory lives as long as the harness.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tocsin_config::model::StorageConfig;
use tocsin_core::types::SchedulerSnapshot;
use tocsin_core::{IncidentStore, SchedulerCode, SnapshotSource, SnapshotStore, TocsinError};
use tocsin_storage::SqliteStore;

/// Build a snapshot with no error message and zero duration.
pub fn snapshot(scheduler_id: &str, timestamp: i64, code: SchedulerCode) -> SchedulerSnapshot {
    SchedulerSnapshot {
        scheduler_id: scheduler_id.to_string(),
        code,
        error_message: None,
        duration_ms: 0,
        timestamp,
    }
}

/// Builder for [`TestHarness`].
#[derive(Debug, Default)]
pub struct TestHarnessBuilder {
    snapshots: Vec<SchedulerSnapshot>,
    query_timeout: Option<Duration>,
}

impl TestHarnessBuilder {
    /// Seed these snapshots right after migration.
    pub fn with_snapshots(mut self, snapshots: impl IntoIterator<Item = SchedulerSnapshot>) -> Self {
        self.snapshots.extend(snapshots);
        self
    }

    /// Override the store's per-call deadline.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub async fn build(self) -> Result<TestHarness, TocsinError> {
        let temp_dir = TempDir::new().map_err(|e| TocsinError::Internal(e.to_string()))?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            ..StorageConfig::default()
        };
        if let Some(timeout) = self.query_timeout {
            config.query_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        }

        let store = SqliteStore::open(&config).await?;
        store.migrate().await?;
        for snapshot in &self.snapshots {
            store.insert_snapshot(snapshot).await?;
        }

        Ok(TestHarness {
            store,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A migrated SQLite store in a temp directory.
pub struct TestHarness {
    store: SqliteStore,
    config: StorageConfig,
    // Dropped last; removes the database file.
    _temp_dir: TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::default()
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Storage configuration pointing at the harness database.
    pub fn storage_config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn incident_store(&self) -> Arc<dyn IncidentStore> {
        Arc::new(self.store.clone())
    }

    pub fn snapshot_source(&self) -> Arc<dyn SnapshotSource> {
        Arc::new(self.store.clone())
    }

    /// Insert `(timestamp, code)` observations for one scheduler, in order.
    pub async fn seed_snapshots(
        &self,
        scheduler_id: &str,
        observations: &[(i64, SchedulerCode)],
    ) -> Result<(), TocsinError> {
        for &(timestamp, code) in observations {
            self.store
                .insert_snapshot(&snapshot(scheduler_id, timestamp, code))
                .await?;
        }
        Ok(())
    }
}

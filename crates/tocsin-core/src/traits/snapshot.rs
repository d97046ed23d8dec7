// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduler snapshot read and write contracts.

use async_trait::async_trait;

use crate::error::TocsinError;
use crate::types::{Page, SchedulerSnapshot, SchedulerUptime, SnapshotQuery, TimeRange};

/// Read access to scheduler snapshots.
///
/// This is the only capability the rule evaluator needs from storage.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// One page of a scheduler's snapshots plus the total matching count.
    async fn get_snapshots(
        &self,
        query: &SnapshotQuery,
    ) -> Result<Page<SchedulerSnapshot>, TocsinError>;
}

/// Full snapshot store, including the write path used by the scheduling
/// subsystem.
#[async_trait]
pub trait SnapshotStore: SnapshotSource {
    /// Record one observation.
    async fn insert_snapshot(&self, snapshot: &SchedulerSnapshot) -> Result<(), TocsinError>;

    /// Share of `OK` snapshots and mean latency for a scheduler.
    async fn get_scheduler_uptime(
        &self,
        scheduler_id: &str,
        time_range: Option<TimeRange>,
    ) -> Result<SchedulerUptime, TocsinError>;
}

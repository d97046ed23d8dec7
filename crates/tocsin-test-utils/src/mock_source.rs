// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory snapshot sources for evaluator tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tocsin_core::types::{Page, SchedulerSnapshot, SnapshotQuery, SortDirection};
use tocsin_core::{SchedulerCode, SnapshotSource, TocsinError};

/// Snapshot source backed by a `Vec`, answering queries the way the SQLite
/// store does and recording every query it receives.
#[derive(Debug, Clone, Default)]
pub struct MockSnapshotSource {
    snapshots: Arc<Mutex<Vec<SchedulerSnapshot>>>,
    queries: Arc<Mutex<Vec<SnapshotQuery>>>,
}

impl MockSnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshots(snapshots: Vec<SchedulerSnapshot>) -> Self {
        Self {
            snapshots: Arc::new(Mutex::new(snapshots)),
            queries: Arc::default(),
        }
    }

    pub async fn push(&self, snapshot: SchedulerSnapshot) {
        self.snapshots.lock().await.push(snapshot);
    }

    /// Every query received so far, in call order.
    pub async fn queries(&self) -> Vec<SnapshotQuery> {
        self.queries.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.queries.lock().await.len()
    }
}

#[async_trait]
impl SnapshotSource for MockSnapshotSource {
    async fn get_snapshots(
        &self,
        query: &SnapshotQuery,
    ) -> Result<Page<SchedulerSnapshot>, TocsinError> {
        self.queries.lock().await.push(query.clone());

        if query.scheduler_id.is_empty() {
            return Err(TocsinError::InvalidRequest(
                "scheduler id must not be empty".into(),
            ));
        }
        query.pagination.validate()?;

        let code = query.status.filter(|c| *c != SchedulerCode::Unspecified);
        let range = query.time_range.unwrap_or_default();

        // Insertion order is the tie-break, matching rowid order in SQLite.
        let mut matching: Vec<(usize, SchedulerSnapshot)> = self
            .snapshots
            .lock()
            .await
            .iter()
            .enumerate()
            .filter(|(_, s)| s.scheduler_id == query.scheduler_id)
            .filter(|(_, s)| code.is_none_or(|c| s.code == c))
            .filter(|(_, s)| range.from.is_none_or(|from| s.timestamp >= from))
            .filter(|(_, s)| range.to.is_none_or(|to| s.timestamp <= to))
            .map(|(i, s)| (i, s.clone()))
            .collect();

        matching.sort_by_key(|(i, s)| (s.timestamp, *i));
        if query.direction == SortDirection::Desc {
            matching.reverse();
        }

        let total_count = matching.len() as u64;
        let offset = usize::try_from(query.pagination.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(query.pagination.limit as usize)
            .map(|(_, s)| s)
            .collect();

        Ok(Page { items, total_count })
    }
}

/// Snapshot source whose every query fails with a connection error.
#[derive(Debug, Clone, Default)]
pub struct FailingSnapshotSource {
    message: String,
}

impl FailingSnapshotSource {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for FailingSnapshotSource {
    async fn get_snapshots(
        &self,
        _query: &SnapshotQuery,
    ) -> Result<Page<SchedulerSnapshot>, TocsinError> {
        Err(TocsinError::connection(std::io::Error::other(
            self.message.clone(),
        )))
    }
}

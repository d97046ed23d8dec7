// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incident persistence contract.

use async_trait::async_trait;

use crate::error::TocsinError;
use crate::lifecycle::IncidentStatus;
use crate::traits::adapter::StoreAdapter;
use crate::types::{Incident, IncidentListRequest, NewIncident, Page};

/// Storage engine for incidents and their status histories.
///
/// Implementations must make the incident row and its history row for one
/// call visible atomically, and must never hold more than one active
/// incident per rule.
#[async_trait]
pub trait IncidentStore: StoreAdapter {
    /// Idempotently create the required storage structures.
    ///
    /// Fails with [`TocsinError::Connection`] when the store is unreachable or
    /// a migration statement fails.
    async fn migrate(&self) -> Result<(), TocsinError>;

    /// Insert an `OPENED` incident together with its initial history row.
    async fn insert_incident(&self, incident: &NewIncident) -> Result<Incident, TocsinError>;

    /// Move an incident to `status`, appending one history row.
    async fn update_incident_status(
        &self,
        incident_id: &str,
        status: IncidentStatus,
    ) -> Result<Incident, TocsinError>;

    /// Fetch an incident with its histories ordered by timestamp ascending.
    async fn get_incident_by_id(&self, incident_id: &str) -> Result<Incident, TocsinError>;

    /// Fetch the single active incident of a rule.
    ///
    /// Returns [`TocsinError::NotFound`] when none exists and
    /// [`TocsinError::IntegrityViolation`] when more than one does.
    async fn get_active_incident_by_rule_id(&self, rule_id: &str)
        -> Result<Incident, TocsinError>;

    /// One page of incidents plus the total count under the same filters.
    async fn get_incidents(
        &self,
        request: &IncidentListRequest,
    ) -> Result<Page<Incident>, TocsinError>;
}

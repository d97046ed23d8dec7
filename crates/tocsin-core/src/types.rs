// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain entities and the filter/sort/pagination request value objects.
//!
//! All logical timestamps (`start_time`, `end_time`, history and snapshot
//! `timestamp`) are Unix milliseconds. Bookkeeping fields (`created_at`,
//! `updated_at`) are RFC 3339 UTC strings.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::TocsinError;
use crate::lifecycle::IncidentStatus;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

// --- Incidents ---

/// A tracked fault tied to a rule, with its full history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    /// Storage-generated opaque id.
    pub id: String,
    /// Caller-supplied unique business key.
    pub incident_id: String,
    pub status: IncidentStatus,
    pub rule_id: String,
    pub start_time: i64,
    /// Unset until the incident is closed.
    pub end_time: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    /// Ordered by timestamp ascending.
    pub histories: Vec<IncidentHistory>,
}

/// One immutable entry in an incident's status trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentHistory {
    pub id: String,
    pub incident_id: String,
    pub status: IncidentStatus,
    pub timestamp: i64,
    pub created_at: String,
}

/// Input for creating an incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncident {
    pub incident_id: String,
    pub rule_id: String,
    /// Must be [`IncidentStatus::Opened`]; anything else is rejected.
    pub status: IncidentStatus,
    pub start_time: i64,
}

impl NewIncident {
    /// A new incident in the `OPENED` state.
    pub fn opened(incident_id: impl Into<String>, rule_id: impl Into<String>, start_time: i64) -> Self {
        Self {
            incident_id: incident_id.into(),
            rule_id: rule_id.into(),
            status: IncidentStatus::Opened,
            start_time,
        }
    }
}

// --- Scheduler snapshots ---

/// Result code of one scheduled check.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum SchedulerCode {
    Unspecified = 0,
    Ok = 1,
    Error = 2,
}

impl SchedulerCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Ok),
            2 => Some(Self::Error),
            _ => None,
        }
    }
}

/// One timestamped observation produced by a scheduled check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub scheduler_id: String,
    pub code: SchedulerCode,
    /// Failure description reported by the check, if any.
    pub error_message: Option<String>,
    /// How long the check took.
    pub duration_ms: i64,
    pub timestamp: i64,
}

/// Availability summary of one scheduler over a time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerUptime {
    /// Share of `OK` snapshots, in `[0, 1]`.
    pub uptime: f64,
    /// Mean check duration in milliseconds.
    pub avg_latency_ms: f64,
    /// Number of snapshots considered.
    pub total: u64,
}

// --- Requests ---

/// 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 50;

    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }

    /// Reject `page < 1` and `limit < 1`.
    pub fn validate(&self) -> Result<(), TocsinError> {
        if self.page < 1 {
            return Err(TocsinError::InvalidRequest(format!(
                "page must be at least 1, got {}",
                self.page
            )));
        }
        if self.limit < 1 {
            return Err(TocsinError::InvalidRequest(format!(
                "limit must be at least 1, got {}",
                self.limit
            )));
        }
        Ok(())
    }

    /// Row offset of this page: `(page - 1) * limit`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Inclusive time bounds in Unix milliseconds. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl TimeRange {
    pub fn between(from: i64, to: i64) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Set or narrow the lower bound. An existing later bound is kept.
    #[must_use]
    pub fn refine_from(mut self, from: i64) -> Self {
        self.from = Some(self.from.map_or(from, |current| current.max(from)));
        self
    }

    /// Set or narrow the upper bound. An existing earlier bound is kept.
    #[must_use]
    pub fn refine_to(mut self, to: i64) -> Self {
        self.to = Some(self.to.map_or(to, |current| current.min(to)));
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// Sort direction. Unknown wire values fall back to descending.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Decode a wire value (`1` ascending, `2` descending, anything else default).
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Asc,
            _ => Self::Desc,
        }
    }
}

/// Allowed incident sort keys. Unknown wire values fall back to start time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSortBy {
    #[default]
    StartTime,
    EndTime,
}

impl IncidentSortBy {
    /// Decode a wire value (`1` start time, `2` end time, anything else default).
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => Self::EndTime,
            _ => Self::StartTime,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentSort {
    pub by: IncidentSortBy,
    pub direction: SortDirection,
}

/// Filter/sort/pagination request for listing incidents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentListRequest {
    /// `None` or `Unspecified` disables the status filter.
    pub status: Option<IncidentStatus>,
    pub rule_id: Option<String>,
    /// Bounds applied to `start_time`.
    pub time_range: Option<TimeRange>,
    /// `None` sorts by start time, descending.
    pub sort: Option<IncidentSort>,
    pub pagination: Pagination,
}

/// Filter/sort/pagination request for reading one scheduler's snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotQuery {
    pub scheduler_id: String,
    /// `None` or `Unspecified` disables the code filter.
    pub status: Option<SchedulerCode>,
    /// Bounds applied to the snapshot timestamp.
    pub time_range: Option<TimeRange>,
    pub direction: SortDirection,
    pub pagination: Pagination,
}

impl SnapshotQuery {
    pub fn new(scheduler_id: impl Into<String>) -> Self {
        Self {
            scheduler_id: scheduler_id.into(),
            status: None,
            time_range: None,
            direction: SortDirection::Desc,
            pagination: Pagination::default(),
        }
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tocsin incident engine.
//!
//! This crate provides the domain types, the error taxonomy, the incident
//! lifecycle state machine, and the adapter traits implemented by store
//! backends and consumed by the rule evaluator.

pub mod error;
pub mod lifecycle;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ErrorClass, TocsinError};
pub use lifecycle::IncidentStatus;
pub use types::{HealthStatus, Incident, IncidentHistory, NewIncident, Page, SchedulerCode};

pub use traits::{IncidentStore, SnapshotSource, SnapshotStore, StoreAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classes_follow_transport_mapping() {
        assert_eq!(
            TocsinError::not_found("incident", "i-1").class(),
            ErrorClass::NotFound
        );
        assert_eq!(
            TocsinError::InvalidTransition {
                from: IncidentStatus::Closed,
                to: IncidentStatus::Opened,
            }
            .class(),
            ErrorClass::Client
        );
        assert_eq!(TocsinError::evaluation("bad").class(), ErrorClass::Client);
        assert_eq!(
            TocsinError::IntegrityViolation("two active".into()).class(),
            ErrorClass::Server
        );
        assert_eq!(
            TocsinError::Timeout {
                duration: std::time::Duration::from_secs(1)
            }
            .class(),
            ErrorClass::Server
        );
        assert_eq!(
            TocsinError::connection(std::io::Error::other("refused")).class(),
            ErrorClass::Server
        );
    }

    #[test]
    fn server_errors_withhold_cause() {
        let err = TocsinError::storage(std::io::Error::other("disk I/O error at page 42"));
        assert_eq!(err.public_message(), "internal server error");
        assert!(err.to_string().contains("page 42"));

        let err = TocsinError::InvalidRequest("limit must be at least 1, got 0".into());
        assert!(err.public_message().contains("limit"));
    }

    #[test]
    fn statuses_serialize_as_wire_names() {
        let json = serde_json::to_string(&IncidentStatus::CanBeClosed).unwrap();
        assert_eq!(json, "\"CAN_BE_CLOSED\"");
        let code: SchedulerCode = serde_json::from_str("\"ERROR\"").unwrap();
        assert_eq!(code, SchedulerCode::Error);
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_store_adapter<T: StoreAdapter>() {}
        fn _assert_incident_store<T: IncidentStore>() {}
        fn _assert_snapshot_source<T: SnapshotSource>() {}
        fn _assert_snapshot_store<T: SnapshotStore>() {}
    }
}

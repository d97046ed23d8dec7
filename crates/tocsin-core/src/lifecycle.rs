// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incident lifecycle: statuses and the transitions allowed between them.
//!
//! ```text
//! OPENED ──► STUDIED ──► CAN_BE_CLOSED
//!   │           │             │
//!   └───────────┴─────────────┴──► CLOSED (terminal)
//! OPENED ──────────────► CAN_BE_CLOSED
//! ```

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::TocsinError;

/// Status of an incident. Discriminants are the persisted integer codes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum IncidentStatus {
    /// Placeholder for a missing status. Never persisted as a resting state.
    Unspecified = 0,
    Opened = 1,
    CanBeClosed = 2,
    Closed = 3,
    Studied = 4,
}

impl IncidentStatus {
    /// Statuses that count as "active" for the one-per-rule invariant.
    pub const ACTIVE: [IncidentStatus; 3] = [Self::Opened, Self::CanBeClosed, Self::Studied];

    /// The persisted integer code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Decode a persisted integer code. Unknown codes decode to `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Opened),
            2 => Some(Self::CanBeClosed),
            3 => Some(Self::Closed),
            4 => Some(Self::Studied),
            _ => None,
        }
    }

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: IncidentStatus) -> bool {
        use IncidentStatus::*;
        matches!(
            (self, next),
            (Opened, Studied)
                | (Opened, CanBeClosed)
                | (Studied, CanBeClosed)
                | (Opened, Closed)
                | (Studied, Closed)
                | (CanBeClosed, Closed)
        )
    }

    /// Like [`can_transition_to`](Self::can_transition_to) but returns
    /// [`TocsinError::InvalidTransition`] on rejection.
    pub fn validate_transition(self, next: IncidentStatus) -> Result<(), TocsinError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TocsinError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

/// What a single transition writes besides the new status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEffect {
    pub status: IncidentStatus,
    /// Timestamp of the appended history row.
    pub history_timestamp: i64,
    /// New `end_time`, set only when the transition closes the incident.
    pub end_time: Option<i64>,
}

/// Compute the writes for moving an incident from `current` to `next` at `now_ms`.
///
/// The history timestamp never precedes the incident's `start_time`.
pub fn plan_transition(
    current: IncidentStatus,
    next: IncidentStatus,
    start_time: i64,
    now_ms: i64,
) -> Result<TransitionEffect, TocsinError> {
    current.validate_transition(next)?;
    let history_timestamp = now_ms.max(start_time);
    Ok(TransitionEffect {
        status: next,
        history_timestamp,
        end_time: next.is_terminal().then_some(history_timestamp),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn allowed_transitions() {
        use IncidentStatus::*;
        assert!(Opened.can_transition_to(Studied));
        assert!(Opened.can_transition_to(CanBeClosed));
        assert!(Studied.can_transition_to(CanBeClosed));
        assert!(Opened.can_transition_to(Closed));
        assert!(Studied.can_transition_to(Closed));
        assert!(CanBeClosed.can_transition_to(Closed));
    }

    #[test]
    fn rejected_transitions() {
        use IncidentStatus::*;
        assert!(!Studied.can_transition_to(Opened));
        assert!(!CanBeClosed.can_transition_to(Studied));
        assert!(!CanBeClosed.can_transition_to(Opened));
        assert!(!Opened.can_transition_to(Opened));
        assert!(!Opened.can_transition_to(Unspecified));
        assert!(!Unspecified.can_transition_to(Opened));
    }

    #[test]
    fn closed_is_terminal() {
        for next in IncidentStatus::iter() {
            assert!(!IncidentStatus::Closed.can_transition_to(next));
        }
        let err = IncidentStatus::Closed
            .validate_transition(IncidentStatus::Opened)
            .unwrap_err();
        assert!(matches!(
            err,
            TocsinError::InvalidTransition {
                from: IncidentStatus::Closed,
                to: IncidentStatus::Opened
            }
        ));
    }

    #[test]
    fn active_set() {
        assert!(IncidentStatus::Opened.is_active());
        assert!(IncidentStatus::Studied.is_active());
        assert!(IncidentStatus::CanBeClosed.is_active());
        assert!(!IncidentStatus::Closed.is_active());
        assert!(!IncidentStatus::Unspecified.is_active());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            IncidentStatus::from_str("can_be_closed").unwrap(),
            IncidentStatus::CanBeClosed
        );
        assert_eq!(IncidentStatus::Closed.to_string(), "CLOSED");
    }

    #[test]
    fn closing_sets_end_time() {
        let effect =
            plan_transition(IncidentStatus::Opened, IncidentStatus::Closed, 100, 500).unwrap();
        assert_eq!(effect.end_time, Some(500));
        assert_eq!(effect.history_timestamp, 500);
    }

    #[test]
    fn history_timestamp_not_before_start() {
        let effect =
            plan_transition(IncidentStatus::Opened, IncidentStatus::Studied, 1_000, 10).unwrap();
        assert_eq!(effect.history_timestamp, 1_000);
        assert_eq!(effect.end_time, None);
    }

    fn any_status() -> impl Strategy<Value = IncidentStatus> {
        (0i32..5).prop_map(|c| IncidentStatus::from_code(c).unwrap())
    }

    proptest! {
        #[test]
        fn end_time_set_iff_closing(
            from in any_status(),
            to in any_status(),
            start in 0i64..1_000_000,
            now in 0i64..1_000_000,
        ) {
            match plan_transition(from, to, start, now) {
                Ok(effect) => {
                    prop_assert!(from.is_active());
                    prop_assert_eq!(effect.end_time.is_some(), to == IncidentStatus::Closed);
                    prop_assert!(effect.history_timestamp >= start);
                }
                Err(_) => prop_assert!(!from.can_transition_to(to)),
            }
        }
    }
}

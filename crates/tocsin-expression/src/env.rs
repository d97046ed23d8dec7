// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The fixed capability set visible to rule expressions.
//!
//! Every name an expression may use is listed here with a static type. Names
//! are resolved once at compile time; evaluation never looks anything up.

use std::fmt;

use serde::Serialize;
use tocsin_core::SchedulerCode;
use tocsin_core::types::{Pagination, SnapshotQuery, SortDirection};

/// Static type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int,
    Bool,
    Str,
    /// A scheduler result code (`Ok`, `Error`, `#.Code`).
    Code,
    Snapshot,
    /// A window of snapshots returned by `last`/`first`/`index`.
    List,
    /// A query refinement built by `UseCode`/`UseTimeFrom`/`UseTimeTo`.
    Filter,
    /// A `{ ... }` closure over `#`.
    Predicate,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Bool => "bool",
            Type::Str => "string",
            Type::Code => "code",
            Type::Snapshot => "snapshot",
            Type::List => "list",
            Type::Filter => "filter",
            Type::Predicate => "predicate",
        };
        f.write_str(name)
    }
}

/// Snapshot window accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// `last(n, ...)`: the `n` newest snapshots, newest first.
    Last,
    /// `first(n, ...)`: the `n` oldest snapshots, oldest first.
    First,
    /// `index(i, ...)`: the snapshot at 0-based ascending position `i`.
    Index,
}

impl Window {
    pub fn name(self) -> &'static str {
        match self {
            Window::Last => "last",
            Window::First => "first",
            Window::Index => "index",
        }
    }
}

/// Collection helpers taking a list and a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    All,
    Any,
    None,
    Count,
}

impl Quantifier {
    pub fn name(self) -> &'static str {
        match self {
            Quantifier::All => "all",
            Quantifier::Any => "any",
            Quantifier::None => "none",
            Quantifier::Count => "count",
        }
    }

    pub fn result_type(self) -> Type {
        match self {
            Quantifier::Count => Type::Int,
            _ => Type::Bool,
        }
    }
}

/// Which side of the time range a `UseTime*` filter sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    From,
    To,
}

/// Every callable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Window(Window),
    UseCode,
    UseTime(TimeBound),
    Len,
    Quantifier(Quantifier),
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "last" => Self::Window(Window::Last),
            "first" => Self::Window(Window::First),
            "index" => Self::Window(Window::Index),
            "UseCode" => Self::UseCode,
            "UseTimeFrom" => Self::UseTime(TimeBound::From),
            "UseTimeTo" => Self::UseTime(TimeBound::To),
            "len" => Self::Len,
            "all" => Self::Quantifier(Quantifier::All),
            "any" => Self::Quantifier(Quantifier::Any),
            "none" => Self::Quantifier(Quantifier::None),
            "count" => Self::Quantifier(Quantifier::Count),
            _ => return None,
        })
    }

    /// Human-readable signature for error messages.
    pub fn signature(self) -> &'static str {
        match self {
            Self::Window(Window::Last) => "last(int, filter...) -> list",
            Self::Window(Window::First) => "first(int, filter...) -> list",
            Self::Window(Window::Index) => "index(int, filter...) -> list",
            Self::UseCode => "UseCode(code) -> filter",
            Self::UseTime(TimeBound::From) => "UseTimeFrom(string) -> filter",
            Self::UseTime(TimeBound::To) => "UseTimeTo(string) -> filter",
            Self::Len => "len(list) -> int",
            Self::Quantifier(Quantifier::All) => "all(list, predicate) -> bool",
            Self::Quantifier(Quantifier::Any) => "any(list, predicate) -> bool",
            Self::Quantifier(Quantifier::None) => "none(list, predicate) -> bool",
            Self::Quantifier(Quantifier::Count) => "count(list, predicate) -> int",
        }
    }
}

/// Named result-code constants.
pub fn lookup_constant(name: &str) -> Option<SchedulerCode> {
    match name {
        "Ok" => Some(SchedulerCode::Ok),
        "Error" => Some(SchedulerCode::Error),
        _ => None,
    }
}

/// Fields readable on a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotField {
    Code,
    Timestamp,
    Duration,
    Error,
    SchedulerId,
}

impl SnapshotField {
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "Code" => Some(Self::Code),
            "Timestamp" => Some(Self::Timestamp),
            "Duration" => Some(Self::Duration),
            "Error" => Some(Self::Error),
            "SchedulerId" => Some(Self::SchedulerId),
            _ => None,
        }
    }

    pub fn field_type(self) -> Type {
        match self {
            Self::Code => Type::Code,
            Self::Timestamp | Self::Duration => Type::Int,
            Self::Error | Self::SchedulerId => Type::Str,
        }
    }
}

/// One refinement of a snapshot window request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotFilter {
    Code(SchedulerCode),
    TimeFrom(i64),
    TimeTo(i64),
}

impl SnapshotFilter {
    /// Return `query` refined by this filter.
    ///
    /// Time bounds narrow an existing bound on the same side rather than
    /// replacing it, so filters compose in any order.
    pub fn apply(self, mut query: SnapshotQuery) -> SnapshotQuery {
        match self {
            SnapshotFilter::Code(code) => query.status = Some(code),
            SnapshotFilter::TimeFrom(from) => {
                query.time_range = Some(query.time_range.unwrap_or_default().refine_from(from));
            }
            SnapshotFilter::TimeTo(to) => {
                query.time_range = Some(query.time_range.unwrap_or_default().refine_to(to));
            }
        }
        query
    }
}

/// Build the request behind a window accessor, folding `filters` left to right.
///
/// `position` is the window size for `last`/`first` and the 0-based index for
/// `index`; callers validate it beforehand.
pub fn window_query(
    scheduler_id: &str,
    window: Window,
    position: u32,
    filters: &[SnapshotFilter],
) -> SnapshotQuery {
    let (direction, pagination) = match window {
        Window::Last => (SortDirection::Desc, Pagination::new(1, position)),
        Window::First => (SortDirection::Asc, Pagination::new(1, position)),
        Window::Index => (SortDirection::Asc, Pagination::new(position.saturating_add(1), 1)),
    };
    let base = SnapshotQuery {
        scheduler_id: scheduler_id.to_string(),
        status: None,
        time_range: None,
        direction,
        pagination,
    };
    filters.iter().fold(base, |query, filter| filter.apply(query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tocsin_core::types::TimeRange;

    #[test]
    fn every_builtin_resolves() {
        for name in [
            "last", "first", "index", "UseCode", "UseTimeFrom", "UseTimeTo", "len", "all", "any",
            "none", "count",
        ] {
            assert!(Builtin::lookup(name).is_some(), "{name}");
        }
        assert!(Builtin::lookup("exec").is_none());
        assert!(Builtin::lookup("Last").is_none());
    }

    #[test]
    fn constants_map_to_terminal_codes() {
        assert_eq!(lookup_constant("Ok"), Some(SchedulerCode::Ok));
        assert_eq!(lookup_constant("Error"), Some(SchedulerCode::Error));
        assert_eq!(lookup_constant("Unspecified"), None);
    }

    #[test]
    fn time_filters_compose_in_either_order() {
        let a = window_query(
            "s",
            Window::Last,
            5,
            &[SnapshotFilter::TimeFrom(10), SnapshotFilter::TimeTo(20)],
        );
        let b = window_query(
            "s",
            Window::Last,
            5,
            &[SnapshotFilter::TimeTo(20), SnapshotFilter::TimeFrom(10)],
        );
        assert_eq!(a, b);
        assert_eq!(a.time_range, Some(TimeRange::between(10, 20)));
    }

    #[test]
    fn later_filter_refines_same_bound() {
        let q = window_query(
            "s",
            Window::First,
            1,
            &[SnapshotFilter::TimeFrom(10), SnapshotFilter::TimeFrom(30)],
        );
        assert_eq!(q.time_range.and_then(|r| r.from), Some(30));
    }

    #[test]
    fn window_pagination() {
        let last = window_query("s", Window::Last, 3, &[]);
        assert_eq!(last.direction, SortDirection::Desc);
        assert_eq!(last.pagination, Pagination::new(1, 3));

        let first = window_query("s", Window::First, 2, &[SnapshotFilter::Code(SchedulerCode::Ok)]);
        assert_eq!(first.direction, SortDirection::Asc);
        assert_eq!(first.status, Some(SchedulerCode::Ok));

        let index = window_query("s", Window::Index, 0, &[]);
        assert_eq!(index.pagination, Pagination::new(1, 1));
        assert_eq!(window_query("s", Window::Index, 4, &[]).pagination.page, 5);
    }
}

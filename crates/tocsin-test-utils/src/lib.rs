// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tocsin integration tests.
//!
//! Provides a temp-database harness and in-memory snapshot sources for fast,
//! deterministic tests without a long-lived database.
//!
//! # Components
//!
//! - [`TestHarness`] - migrated SQLite store in a temp directory, with snapshot seeding
//! - [`MockSnapshotSource`] - in-memory snapshot source that records every query
//! - [`FailingSnapshotSource`] - snapshot source whose every query fails

pub mod harness;
pub mod mock_source;

pub use harness::{TestHarness, snapshot};
pub use mock_source::{FailingSnapshotSource, MockSnapshotSource};

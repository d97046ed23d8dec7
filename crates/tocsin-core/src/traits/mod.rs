// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits at the seams between the storage engine, the rule
//! evaluator, and callers.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod snapshot;
pub mod storage;

pub use adapter::StoreAdapter;
pub use snapshot::{SnapshotSource, SnapshotStore};
pub use storage::IncidentStore;

// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait shared by store backends.

use async_trait::async_trait;

use crate::error::TocsinError;
use crate::types::HealthStatus;

/// Identity, health, and lifecycle of a store backend.
#[async_trait]
pub trait StoreAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this backend.
    fn name(&self) -> &str;

    /// Returns the semantic version of this backend.
    fn version(&self) -> semver::Version;

    /// Performs a health check and returns the backend's current status.
    async fn health_check(&self) -> Result<HealthStatus, TocsinError>;

    /// Flushes pending writes and releases held resources.
    async fn shutdown(&self) -> Result<(), TocsinError>;
}

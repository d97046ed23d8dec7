// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations using refinery.
//!
//! SQL files under `migrations/` are compiled into the binary. Refinery
//! records applied versions in `refinery_schema_history`, so running the
//! set twice is a no-op.

use tocsin_core::TocsinError;
use tracing::info;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply every pending migration on `conn`.
///
/// Any failure is reported as [`TocsinError::Connection`]: a store that
/// cannot carry the schema is not usable.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), TocsinError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(TocsinError::connection)?;
    let applied = report.applied_migrations();
    if !applied.is_empty() {
        info!(count = applied.len(), "applied storage migrations");
    }
    Ok(())
}

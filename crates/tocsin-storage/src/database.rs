// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes: the
//! transactional guarantees of the query modules rely on one writer.

use std::time::Duration;

use rusqlite::ErrorCode;
use tocsin_config::model::StorageConfig;
use tocsin_core::TocsinError;
use tracing::debug;

use crate::migrations;

/// Handle to the SQLite store. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) the database file at `path` with default settings.
    pub async fn open(path: &str) -> Result<Self, TocsinError> {
        let config = StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        };
        Self::open_with(&config).await
    }

    /// Open the database described by `config` and apply connection PRAGMAs.
    ///
    /// Fails with [`TocsinError::Connection`] if the file cannot be opened.
    /// Migrations are not run; call [`Database::migrate`].
    pub async fn open_with(config: &StorageConfig) -> Result<Self, TocsinError> {
        let conn = tokio_rusqlite::Connection::open(&config.database_path)
            .await
            .map_err(TocsinError::connection)?;
        let db = Self { conn };
        db.configure(config.wal_mode, config.busy_timeout()).await?;
        debug!(path = %config.database_path, wal = config.wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, TocsinError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(TocsinError::connection)?;
        let db = Self { conn };
        db.configure(false, Duration::from_secs(5)).await?;
        Ok(db)
    }

    async fn configure(&self, wal_mode: bool, busy_timeout: Duration) -> Result<(), TocsinError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    // journal_mode returns the resulting mode as a row.
                    let _mode: String =
                        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
                    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
                }
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                conn.busy_timeout(busy_timeout)?;
                Ok(())
            })
            .await
            .map_err(|e| match e {
                // A file that is not a database surfaces on the first statement.
                tokio_rusqlite::Error::Error(inner) => match map_sql_err(inner) {
                    TocsinError::Storage { source } => TocsinError::Connection { source },
                    other => other,
                },
                other => TocsinError::connection(other.to_string()),
            })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Apply all pending migrations. Idempotent.
    pub async fn migrate(&self) -> Result<(), TocsinError> {
        self.conn
            .call(|conn| -> Result<(), TocsinError> { migrations::run_migrations(conn) })
            .await
            .map_err(|e| match e {
                tokio_rusqlite::Error::Error(inner) => inner,
                other => TocsinError::connection(other.to_string()),
            })
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), TocsinError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(map_tr_err)
    }

    /// Flush the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), TocsinError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Error produced inside a transactional closure: either SQLite failed or the
/// operation was rejected on domain grounds before committing.
#[derive(Debug, thiserror::Error)]
pub(crate) enum TxError {
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
    #[error("{0}")]
    Rejected(TocsinError),
}

/// Map a rusqlite failure onto the error taxonomy.
pub(crate) fn map_sql_err(e: rusqlite::Error) -> TocsinError {
    match e.sqlite_error_code() {
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::PermissionDenied
            | ErrorCode::DatabaseCorrupt,
        ) => TocsinError::connection(e),
        Some(ErrorCode::ConstraintViolation) => {
            TocsinError::IntegrityViolation(format!("constraint violated: {e}"))
        }
        _ => TocsinError::storage(e),
    }
}

/// Map a tokio-rusqlite call failure for closures returning `rusqlite::Error`.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> TocsinError {
    match e {
        tokio_rusqlite::Error::Error(inner) => map_sql_err(inner),
        other => TocsinError::connection(other.to_string()),
    }
}

/// Map a tokio-rusqlite call failure for transactional closures.
pub(crate) fn map_tx_err(e: tokio_rusqlite::Error<TxError>) -> TocsinError {
    match e {
        tokio_rusqlite::Error::Error(TxError::Sql(inner)) => map_sql_err(inner),
        tokio_rusqlite::Error::Error(TxError::Rejected(err)) => err,
        other => TocsinError::connection(other.to_string()),
    }
}

// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by the storage engine, the rule evaluator, and callers.

use thiserror::Error;

use crate::lifecycle::IncidentStatus;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type returned by every Tocsin operation.
///
/// Variants follow the incident-management taxonomy: store failures are kept
/// apart from domain rejections so transport layers can map them with
/// [`TocsinError::class`].
#[derive(Debug, Error)]
pub enum TocsinError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// The store could not be reached (open failure, closed connection, migration failure).
    #[error("connection error: {source}")]
    Connection { source: BoxError },

    /// A statement against a reachable store failed.
    #[error("storage error: {source}")]
    Storage { source: BoxError },

    /// The requested incident or snapshot does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An incident with the same business key already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// The requested status change is not legal from the current status.
    #[error("invalid incident transition: {from} -> {to}")]
    InvalidTransition {
        from: IncidentStatus,
        to: IncidentStatus,
    },

    /// Stored data breaks an invariant (two active incidents for one rule,
    /// orphaned history). Always surfaced, never auto-corrected.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// A store round trip exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// A rule expression failed to compile or evaluate.
    #[error("evaluation error: {message}")]
    Evaluation {
        message: String,
        source: Option<BoxError>,
    },

    /// A request broke its own invariants (`page < 1`, `limit < 1`, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by transport layers to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Maps to an empty / 404-equivalent response.
    NotFound,
    /// Maps to a client-error response; the message is safe to show.
    Client,
    /// Maps to a server-error response; the cause stays in the logs.
    Server,
}

impl TocsinError {
    /// Wrap a store statement failure.
    pub fn storage(source: impl Into<BoxError>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Wrap a connectivity failure.
    pub fn connection(source: impl Into<BoxError>) -> Self {
        Self::Connection {
            source: source.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
            source: None,
        }
    }

    /// Classify this error for transport mapping.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::AlreadyExists { .. }
            | Self::InvalidTransition { .. }
            | Self::Evaluation { .. }
            | Self::InvalidRequest(_) => ErrorClass::Client,
            Self::Config(_)
            | Self::Connection { .. }
            | Self::Storage { .. }
            | Self::IntegrityViolation(_)
            | Self::Timeout { .. }
            | Self::Internal(_) => ErrorClass::Server,
        }
    }

    /// Message suitable for external callers.
    ///
    /// Server-class errors return a generic message; the full error is only
    /// available through `Display` for logging.
    pub fn public_message(&self) -> String {
        match self.class() {
            ErrorClass::Server => match self {
                Self::Timeout { .. } => "request timed out".to_string(),
                _ => "internal server error".to_string(),
            },
            _ => self.to_string(),
        }
    }
}

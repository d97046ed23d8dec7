// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compile-time and run-time failures of rule expressions.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::time::Duration;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;
use tocsin_core::TocsinError;

/// Every failure a rule expression can produce.
///
/// Compile-time variants carry a span into the expression text; attach the
/// text with [`miette::Report::with_source_code`] to render it.
#[derive(Debug, Error, Diagnostic)]
pub enum ExpressionError {
    /// Malformed expression text.
    #[error("syntax error: {message}")]
    #[diagnostic(code(tocsin::expression::syntax))]
    Syntax {
        message: String,
        #[label("here")]
        span: SourceSpan,
    },

    /// A name that is not part of the rule environment.
    #[error("unknown name `{name}`")]
    #[diagnostic(
        code(tocsin::expression::unknown_name),
        help("available: last, first, index, UseCode, UseTimeFrom, UseTimeTo, len, all, any, none, count, Ok, Error")
    )]
    UnknownName {
        name: String,
        #[label("not defined")]
        span: SourceSpan,
    },

    /// Operands or arguments of the wrong type.
    #[error("type error: {message}")]
    #[diagnostic(code(tocsin::expression::type_mismatch))]
    Type {
        message: String,
        #[label("{message}")]
        span: SourceSpan,
    },

    /// A well-typed expression failed while running (index out of range,
    /// division by zero, window too large, ...).
    #[error("runtime error: {message}")]
    #[diagnostic(code(tocsin::expression::runtime))]
    Runtime { message: String },

    /// A snapshot query issued by the expression failed.
    #[error("snapshot query `{operation}` failed: {source}")]
    #[diagnostic(code(tocsin::expression::store))]
    Store {
        operation: &'static str,
        #[source]
        source: TocsinError,
    },

    /// The whole evaluation exceeded its deadline.
    #[error("evaluation exceeded {duration:?}")]
    #[diagnostic(code(tocsin::expression::timeout))]
    Timeout { duration: Duration },
}

impl ExpressionError {
    pub(crate) fn syntax(message: impl Into<String>, span: impl Into<SourceSpan>) -> Self {
        Self::Syntax {
            message: message.into(),
            span: span.into(),
        }
    }

    pub(crate) fn type_error(message: impl Into<String>, span: impl Into<SourceSpan>) -> Self {
        Self::Type {
            message: message.into(),
            span: span.into(),
        }
    }

    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Whether the expression was rejected before touching the store.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::Syntax { .. } | Self::UnknownName { .. } | Self::Type { .. }
        )
    }
}

impl From<ExpressionError> for TocsinError {
    fn from(err: ExpressionError) -> Self {
        TocsinError::Evaluation {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tocsin_core::ErrorClass;

    #[test]
    fn converts_to_client_class_evaluation_error() {
        let err: TocsinError = ExpressionError::runtime("index 3 out of range").into();
        assert!(matches!(err, TocsinError::Evaluation { .. }));
        assert_eq!(err.class(), ErrorClass::Client);
        assert!(err.to_string().contains("index 3 out of range"));
    }

    #[test]
    fn store_failure_keeps_cause_in_chain() {
        let err = ExpressionError::Store {
            operation: "last",
            source: TocsinError::Timeout {
                duration: Duration::from_millis(5),
            },
        };
        assert!(!err.is_compile_error());
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("timed out"));
    }
}

// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule expression language for Tocsin.
//!
//! A rule is a small expression evaluated for one scheduler against its
//! snapshot history:
//!
//! ```text
//! count(last(5, UseCode(Error)), {#.Duration > 2000}) >= 3
//!     && len(last(10, UseTimeFrom('2026-01-01T00:00:00Z'), UseCode(Ok))) == 0
//! ```
//!
//! Expressions are compiled once ([`compile`], [`compile_rule`]): every name
//! is resolved against the fixed capability set in [`env`] and every operand
//! is type-checked, so unknown names and signature mismatches surface before
//! any query runs. Compiled programs are then run by an [`Evaluator`] over
//! any [`SnapshotSource`](tocsin_core::SnapshotSource). Store failures reached
//! during evaluation are returned as [`ExpressionError::Store`].

pub mod ast;
pub mod compile;
pub mod env;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use compile::{Program, compile, compile_rule};
pub use env::{SnapshotFilter, Type};
pub use error::ExpressionError;
pub use eval::{Evaluator, Value};

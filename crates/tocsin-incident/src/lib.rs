// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule reconciliation for Tocsin.
//!
//! A [`Rule`] binds a boolean expression to a scheduler. Each reconciliation
//! evaluates the rule and moves the rule's incident through its lifecycle:
//!
//! | rule fired | active incident            | result                          |
//! |------------|----------------------------|---------------------------------|
//! | yes        | none                       | new `OPENED` incident           |
//! | yes        | any                        | unchanged                       |
//! | no         | `OPENED` / `STUDIED`       | `CAN_BE_CLOSED`, or `CLOSED` with auto-close |
//! | no         | `CAN_BE_CLOSED`            | unchanged, or `CLOSED` with auto-close |
//! | no         | none                       | nothing                         |
//!
//! Reconciliations of the same rule never interleave.

pub mod reconciler;
pub mod rule;

pub use reconciler::{Outcome, Reconciler};
pub use rule::{CompiledRule, Rule};

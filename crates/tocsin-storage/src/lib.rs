// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite storage engine for Tocsin.
//!
//! Provides WAL-mode SQLite persistence with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, a parameterized
//! query builder, and transactional incident writes that keep every
//! incident row paired with its history.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;
pub mod query;

pub use adapter::SqliteStore;
pub use database::Database;

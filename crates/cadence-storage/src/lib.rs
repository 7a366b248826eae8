// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Cadence publish engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed queries for calendars,
//! the publish queue, posts, schedules and prompt templates.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;
pub(crate) mod sql;

pub use adapter::SqliteStorage;
pub use database::Database;

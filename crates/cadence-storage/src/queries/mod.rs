// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for storage entities.
//!
//! Every function takes the [`Database`](crate::Database) handle and runs its
//! statements inside one `call` on the writer thread.

pub mod accounts;
pub mod calendars;
pub mod posts;
pub mod queue;
pub mod schedules;
pub mod templates;

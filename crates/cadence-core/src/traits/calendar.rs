// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Calendar persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CadenceError;
use crate::types::{Calendar, CalendarDeletion, CalendarUpdate, NewCalendar, NewSlot, Slot};

/// Persistence for calendars and their slots.
///
/// Inputs arrive already validated; implementations only store them.
#[async_trait]
pub trait CalendarRepository: Send + Sync {
    async fn create_calendar(&self, input: &NewCalendar) -> Result<Calendar, CadenceError>;

    async fn get_calendar(&self, calendar_id: &str) -> Result<Option<Calendar>, CadenceError>;

    /// All calendars owned by `user_id`, newest first.
    async fn list_calendars(&self, user_id: &str) -> Result<Vec<Calendar>, CadenceError>;

    /// Returns the updated calendar, or `None` if it does not exist.
    async fn update_calendar(
        &self,
        calendar_id: &str,
        update: &CalendarUpdate,
    ) -> Result<Option<Calendar>, CadenceError>;

    /// Deletes the calendar and cancels its queued items in one transaction.
    async fn delete_calendar(&self, calendar_id: &str) -> Result<CalendarDeletion, CadenceError>;

    async fn add_slot(&self, calendar_id: &str, slot: &NewSlot) -> Result<Slot, CadenceError>;

    /// Overwrites a slot's fields. Returns `false` if the slot is not on the calendar.
    async fn replace_slot(&self, calendar_id: &str, slot: &Slot) -> Result<bool, CadenceError>;

    async fn remove_slot(&self, calendar_id: &str, slot_id: &str) -> Result<bool, CadenceError>;

    /// Bumps `publishCount` and stamps `lastPublishedAt`.
    async fn increment_publish_count(
        &self,
        calendar_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CadenceError>;
}

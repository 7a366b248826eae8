// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ownership-checked calendar and slot management.

use std::sync::Arc;

use tracing::info;

use cadence_core::types::{
    Calendar, CalendarDeletion, CalendarUpdate, DEFAULT_TIMEZONE, NewCalendar, NewSlot, Slot,
    SlotUpdate,
};
use cadence_core::{CadenceError, CalendarRepository};

use crate::slot::parse_timezone;

/// Calendar API. Every call that names a calendar checks it belongs to
/// `user_id`; a calendar owned by someone else is reported as not found.
pub struct CalendarService {
    calendars: Arc<dyn CalendarRepository>,
}

impl CalendarService {
    pub fn new(calendars: Arc<dyn CalendarRepository>) -> Self {
        Self { calendars }
    }

    pub async fn create_calendar(&self, input: &NewCalendar) -> Result<Calendar, CadenceError> {
        if input.name.trim().is_empty() {
            return Err(CadenceError::Validation("calendar name is required".into()));
        }
        parse_timezone(input.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE))?;
        for slot in &input.slots {
            slot.validate()?;
        }
        let calendar = self.calendars.create_calendar(input).await?;
        info!(
            calendar_id = %calendar.id,
            user_id = %calendar.user_id,
            slots = calendar.slots.len(),
            "calendar created"
        );
        Ok(calendar)
    }

    /// Loads a calendar the user owns.
    pub async fn get_calendar(
        &self,
        calendar_id: &str,
        user_id: &str,
    ) -> Result<Calendar, CadenceError> {
        match self.calendars.get_calendar(calendar_id).await? {
            Some(calendar) if calendar.user_id == user_id => Ok(calendar),
            _ => Err(CadenceError::CalendarNotFound {
                calendar_id: calendar_id.to_string(),
            }),
        }
    }

    pub async fn list_calendars(&self, user_id: &str) -> Result<Vec<Calendar>, CadenceError> {
        self.calendars.list_calendars(user_id).await
    }

    pub async fn update_calendar(
        &self,
        calendar_id: &str,
        user_id: &str,
        update: &CalendarUpdate,
    ) -> Result<Calendar, CadenceError> {
        self.get_calendar(calendar_id, user_id).await?;
        if update.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(CadenceError::Validation("calendar name is required".into()));
        }
        if let Some(timezone) = &update.timezone {
            parse_timezone(timezone)?;
        }
        self.calendars
            .update_calendar(calendar_id, update)
            .await?
            .ok_or_else(|| CadenceError::CalendarNotFound {
                calendar_id: calendar_id.to_string(),
            })
    }

    /// Deletes the calendar and cancels its queued items.
    pub async fn delete_calendar(
        &self,
        calendar_id: &str,
        user_id: &str,
    ) -> Result<CalendarDeletion, CadenceError> {
        self.get_calendar(calendar_id, user_id).await?;
        let deletion = self.calendars.delete_calendar(calendar_id).await?;
        info!(
            calendar_id,
            cancelled = deletion.cancelled_queue_items,
            "calendar deleted"
        );
        Ok(deletion)
    }

    pub async fn add_slot(
        &self,
        calendar_id: &str,
        user_id: &str,
        slot: &NewSlot,
    ) -> Result<Slot, CadenceError> {
        slot.validate()?;
        self.get_calendar(calendar_id, user_id).await?;
        self.calendars.add_slot(calendar_id, slot).await
    }

    /// Applies a partial update to one slot. `false` if the slot is not on
    /// the calendar.
    pub async fn update_slot(
        &self,
        calendar_id: &str,
        user_id: &str,
        slot_id: &str,
        update: &SlotUpdate,
    ) -> Result<bool, CadenceError> {
        let calendar = self.get_calendar(calendar_id, user_id).await?;
        let Some(mut slot) = calendar.slot(slot_id).cloned() else {
            return Ok(false);
        };
        update.apply(&mut slot)?;
        self.calendars.replace_slot(calendar_id, &slot).await
    }

    pub async fn remove_slot(
        &self,
        calendar_id: &str,
        user_id: &str,
        slot_id: &str,
    ) -> Result<bool, CadenceError> {
        self.get_calendar(calendar_id, user_id).await?;
        self.calendars.remove_slot(calendar_id, slot_id).await
    }
}

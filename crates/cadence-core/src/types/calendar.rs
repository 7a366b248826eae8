// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publish calendars and their recurring weekly slots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CadenceError;

/// Timezone assigned to calendars created without one.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// A recurring weekly time-of-day on a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: String,
    /// 0 = Sunday through 6 = Saturday.
    pub day_of_week: u8,
    pub hour: u8,
    pub minute: u8,
    pub is_enabled: bool,
}

impl Slot {
    /// Minutes since local midnight, the in-day sort key.
    pub fn minute_of_day(&self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }
}

/// Input for adding a slot to a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSlot {
    pub day_of_week: u8,
    pub hour: u8,
    #[serde(default)]
    pub minute: u8,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl NewSlot {
    pub fn new(day_of_week: u8, hour: u8, minute: u8) -> Self {
        Self {
            day_of_week,
            hour,
            minute,
            is_enabled: true,
        }
    }

    /// Rejects out-of-range weekday and wall-clock values.
    pub fn validate(&self) -> Result<(), CadenceError> {
        validate_slot_fields(self.day_of_week, self.hour, self.minute)
    }
}

/// Partial update of a slot. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotUpdate {
    pub day_of_week: Option<u8>,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub is_enabled: Option<bool>,
}

impl SlotUpdate {
    /// Applies the update to `slot` and validates the result.
    pub fn apply(&self, slot: &mut Slot) -> Result<(), CadenceError> {
        let day_of_week = self.day_of_week.unwrap_or(slot.day_of_week);
        let hour = self.hour.unwrap_or(slot.hour);
        let minute = self.minute.unwrap_or(slot.minute);
        validate_slot_fields(day_of_week, hour, minute)?;
        slot.day_of_week = day_of_week;
        slot.hour = hour;
        slot.minute = minute;
        if let Some(enabled) = self.is_enabled {
            slot.is_enabled = enabled;
        }
        Ok(())
    }
}

fn validate_slot_fields(day_of_week: u8, hour: u8, minute: u8) -> Result<(), CadenceError> {
    if day_of_week > 6 {
        return Err(CadenceError::Validation(format!(
            "dayOfWeek must be between 0 and 6, got {day_of_week}"
        )));
    }
    if hour > 23 {
        return Err(CadenceError::Validation(format!(
            "hour must be between 0 and 23, got {hour}"
        )));
    }
    if minute > 59 {
        return Err(CadenceError::Validation(format!(
            "minute must be between 0 and 59, got {minute}"
        )));
    }
    Ok(())
}

/// A user's publish calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    /// IANA timezone the slot wall-clock times are resolved in.
    pub timezone: String,
    pub is_active: bool,
    pub slots: Vec<Slot>,
    pub publish_count: u64,
    pub last_published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Calendar {
    pub fn enabled_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| s.is_enabled)
    }

    pub fn slot(&self, slot_id: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id == slot_id)
    }
}

/// Input for creating a calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCalendar {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub slots: Vec<NewSlot>,
}

/// Partial update of a calendar's own fields (slots are edited separately).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub timezone: Option<String>,
    pub is_active: Option<bool>,
}

/// The slot picked for a piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAssignment {
    pub slot_id: String,
    pub publish_at: DateTime<Utc>,
}

/// Result of deleting a calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDeletion {
    pub deleted: bool,
    pub cancelled_queue_items: u64,
}

// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Next-available-slot search over a calendar's weekly slots.
//!
//! Slots are wall-clock times in the calendar's IANA timezone. The search
//! walks day by day from the local date of `after`, tries each enabled slot of
//! that weekday in time order, and returns the first one that is far enough
//! in the future and not held by another active queue item.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use cadence_config::model::QueueConfig;
use cadence_core::types::{Calendar, Slot, SlotAssignment};
use cadence_core::{CadenceError, QueueRepository};

/// Bounds of a slot search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSearch {
    /// Day offsets `0..=horizon_days` from today are searched.
    pub horizon_days: u32,
    /// Candidates at or before `after + buffer` are skipped.
    pub buffer: Duration,
}

impl Default for SlotSearch {
    fn default() -> Self {
        Self {
            horizon_days: 14,
            buffer: Duration::from_secs(60),
        }
    }
}

impl From<&QueueConfig> for SlotSearch {
    fn from(config: &QueueConfig) -> Self {
        Self {
            horizon_days: config.slot_horizon_days,
            buffer: Duration::from_secs(config.slot_buffer_secs),
        }
    }
}

/// Answers whether a publish time is already held on a calendar.
#[async_trait]
pub trait SlotOccupancy: Send + Sync {
    async fn is_taken(
        &self,
        calendar_id: &str,
        publish_at: DateTime<Utc>,
    ) -> Result<bool, CadenceError>;
}

#[async_trait]
impl<T: QueueRepository + ?Sized> SlotOccupancy for T {
    async fn is_taken(
        &self,
        calendar_id: &str,
        publish_at: DateTime<Utc>,
    ) -> Result<bool, CadenceError> {
        self.is_slot_taken(calendar_id, publish_at, None).await
    }
}

/// Parses an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, CadenceError> {
    Tz::from_str(name).map_err(|_| CadenceError::Validation(format!("unknown timezone: {name}")))
}

fn resolve(tz: Tz, day: NaiveDate, slot: &Slot) -> Option<DateTime<Utc>> {
    let naive = day.and_hms_opt(u32::from(slot.hour), u32::from(slot.minute), 0)?;
    // A wall-clock time inside a DST gap has no instant and is skipped; an
    // ambiguous one resolves to its first occurrence.
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Every eligible candidate in search order, ignoring occupancy.
pub fn candidate_slots(
    calendar: &Calendar,
    after: DateTime<Utc>,
    search: SlotSearch,
) -> Result<Vec<SlotAssignment>, CadenceError> {
    let tz = parse_timezone(&calendar.timezone)?;
    let mut enabled: Vec<&Slot> = calendar.enabled_slots().collect();
    if enabled.is_empty() {
        return Ok(Vec::new());
    }
    enabled.sort_by_key(|slot| slot.minute_of_day());

    let buffer = chrono::Duration::from_std(search.buffer)
        .map_err(|e| CadenceError::Internal(format!("slot buffer out of range: {e}")))?;
    let earliest = after + buffer;
    let start = after.with_timezone(&tz).date_naive();

    let mut candidates = Vec::new();
    for offset in 0..=search.horizon_days {
        let Some(day) = start.checked_add_days(Days::new(u64::from(offset))) else {
            break;
        };
        let weekday = day.weekday().num_days_from_sunday();
        for slot in enabled
            .iter()
            .filter(|slot| u32::from(slot.day_of_week) == weekday)
        {
            let Some(publish_at) = resolve(tz, day, slot) else {
                continue;
            };
            if publish_at <= earliest {
                continue;
            }
            candidates.push(SlotAssignment {
                slot_id: slot.id.clone(),
                publish_at,
            });
        }
    }
    Ok(candidates)
}

/// First candidate not held by an active item, or `None` when the horizon is
/// exhausted or the calendar has no enabled slots.
pub async fn find_next_slot<O>(
    calendar: &Calendar,
    occupancy: &O,
    after: DateTime<Utc>,
    search: SlotSearch,
) -> Result<Option<SlotAssignment>, CadenceError>
where
    O: SlotOccupancy + ?Sized,
{
    for candidate in candidate_slots(calendar, after, search)? {
        if !occupancy.is_taken(&calendar.id, candidate.publish_at).await? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

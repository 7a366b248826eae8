// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Calendar and slot queries.

use cadence_core::CadenceError;
use cadence_core::types::{
    Calendar, CalendarDeletion, CalendarUpdate, DEFAULT_TIMEZONE, NewCalendar, NewSlot, Slot,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::sql::{get_ts, get_ts_opt, new_id, ts};

const CALENDAR_COLUMNS: &str = "id, user_id, name, description, timezone, is_active, \
     publish_count, last_published_at, created_at, updated_at";

fn load_slots(conn: &Connection, calendar_id: &str) -> rusqlite::Result<Vec<Slot>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, day_of_week, hour, minute, is_enabled
         FROM calendar_slots WHERE calendar_id = ?1
         ORDER BY position ASC",
    )?;
    stmt.query_map(params![calendar_id], |row| {
        Ok(Slot {
            id: row.get(0)?,
            day_of_week: row.get(1)?,
            hour: row.get(2)?,
            minute: row.get(3)?,
            is_enabled: row.get(4)?,
        })
    })?
    .collect()
}

fn calendar_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Calendar> {
    Ok(Calendar {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        timezone: row.get(4)?,
        is_active: row.get(5)?,
        slots: Vec::new(),
        publish_count: row.get(6)?,
        last_published_at: get_ts_opt(row, 7)?,
        created_at: get_ts(row, 8)?,
        updated_at: get_ts(row, 9)?,
    })
}

/// Loads a calendar with its slots on an open connection.
pub(crate) fn load_calendar(conn: &Connection, id: &str) -> rusqlite::Result<Option<Calendar>> {
    let calendar = conn
        .query_row(
            &format!("SELECT {CALENDAR_COLUMNS} FROM calendars WHERE id = ?1"),
            params![id],
            calendar_from_row,
        )
        .optional()?;
    match calendar {
        Some(mut calendar) => {
            calendar.slots = load_slots(conn, &calendar.id)?;
            Ok(Some(calendar))
        }
        None => Ok(None),
    }
}

fn insert_slot(
    conn: &Connection,
    calendar_id: &str,
    slot: &NewSlot,
) -> rusqlite::Result<Slot> {
    let id = new_id();
    conn.execute(
        "INSERT INTO calendar_slots
             (id, calendar_id, day_of_week, hour, minute, is_enabled, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                 (SELECT COALESCE(MAX(position), -1) + 1 FROM calendar_slots
                  WHERE calendar_id = ?2))",
        params![
            id,
            calendar_id,
            slot.day_of_week,
            slot.hour,
            slot.minute,
            slot.is_enabled
        ],
    )?;
    Ok(Slot {
        id,
        day_of_week: slot.day_of_week,
        hour: slot.hour,
        minute: slot.minute,
        is_enabled: slot.is_enabled,
    })
}

fn touch(conn: &Connection, calendar_id: &str, now: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE calendars SET updated_at = ?1 WHERE id = ?2",
        params![now, calendar_id],
    )
}

/// Inserts a calendar and its initial slots in one transaction.
pub async fn create_calendar(
    db: &Database,
    input: &NewCalendar,
    now: DateTime<Utc>,
) -> Result<Calendar, CadenceError> {
    let input = input.clone();
    let id = new_id();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let now = ts(now);
            tx.execute(
                "INSERT INTO calendars (id, user_id, name, description, timezone, is_active,
                                        publish_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, 0, ?6, ?6)",
                params![
                    id,
                    input.user_id,
                    input.name,
                    input.description,
                    input.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE),
                    now
                ],
            )?;
            for slot in &input.slots {
                insert_slot(&tx, &id, slot)?;
            }
            let calendar = load_calendar(&tx, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(calendar)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_calendar(db: &Database, id: &str) -> Result<Option<Calendar>, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| load_calendar(conn, &id))
        .await
        .map_err(map_tr_err)
}

pub async fn list_calendars(db: &Database, user_id: &str) -> Result<Vec<Calendar>, CadenceError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut calendars = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CALENDAR_COLUMNS} FROM calendars
                     WHERE user_id = ?1 ORDER BY created_at DESC, id"
                ))?;
                stmt.query_map(params![user_id], calendar_from_row)?
                    .collect::<Result<Vec<_>, _>>()?
            };
            for calendar in &mut calendars {
                calendar.slots = load_slots(conn, &calendar.id)?;
            }
            Ok(calendars)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_calendar(
    db: &Database,
    id: &str,
    update: &CalendarUpdate,
    now: DateTime<Utc>,
) -> Result<Option<Calendar>, CadenceError> {
    let id = id.to_string();
    let update = update.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE calendars SET
                    name = COALESCE(?1, name),
                    description = COALESCE(?2, description),
                    timezone = COALESCE(?3, timezone),
                    is_active = COALESCE(?4, is_active),
                    updated_at = ?5
                 WHERE id = ?6",
                params![
                    update.name,
                    update.description,
                    update.timezone,
                    update.is_active,
                    ts(now),
                    id
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            load_calendar(conn, &id)
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes a calendar (slots cascade) and cancels its queued items.
pub async fn delete_calendar(
    db: &Database,
    id: &str,
    now: DateTime<Utc>,
) -> Result<CalendarDeletion, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let cancelled = tx.execute(
                "UPDATE queue_items SET status = 'cancelled', updated_at = ?1
                 WHERE calendar_id = ?2 AND status = 'queued'",
                params![ts(now), id],
            )?;
            let deleted = tx.execute("DELETE FROM calendars WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(CalendarDeletion {
                deleted: deleted > 0,
                cancelled_queue_items: cancelled as u64,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Appends a slot. Fails with `CalendarNotFound` if the calendar is missing.
pub async fn add_slot(
    db: &Database,
    calendar_id: &str,
    slot: &NewSlot,
    now: DateTime<Utc>,
) -> Result<Slot, CadenceError> {
    let calendar_id = calendar_id.to_string();
    let slot = slot.clone();
    let missing = CadenceError::CalendarNotFound {
        calendar_id: calendar_id.clone(),
    };
    let inserted = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            if touch(&tx, &calendar_id, &ts(now))? == 0 {
                return Ok(None);
            }
            let slot = insert_slot(&tx, &calendar_id, &slot)?;
            tx.commit()?;
            Ok(Some(slot))
        })
        .await
        .map_err(map_tr_err)?;
    inserted.ok_or(missing)
}

pub async fn replace_slot(
    db: &Database,
    calendar_id: &str,
    slot: &Slot,
    now: DateTime<Utc>,
) -> Result<bool, CadenceError> {
    let calendar_id = calendar_id.to_string();
    let slot = slot.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE calendar_slots SET day_of_week = ?1, hour = ?2, minute = ?3, is_enabled = ?4
                 WHERE id = ?5 AND calendar_id = ?6",
                params![
                    slot.day_of_week,
                    slot.hour,
                    slot.minute,
                    slot.is_enabled,
                    slot.id,
                    calendar_id
                ],
            )?;
            if changed > 0 {
                touch(&tx, &calendar_id, &ts(now))?;
            }
            tx.commit()?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn remove_slot(
    db: &Database,
    calendar_id: &str,
    slot_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, CadenceError> {
    let calendar_id = calendar_id.to_string();
    let slot_id = slot_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM calendar_slots WHERE id = ?1 AND calendar_id = ?2",
                params![slot_id, calendar_id],
            )?;
            if removed > 0 {
                touch(&tx, &calendar_id, &ts(now))?;
            }
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn increment_publish_count(
    db: &Database,
    calendar_id: &str,
    at: DateTime<Utc>,
) -> Result<(), CadenceError> {
    let calendar_id = calendar_id.to_string();
    db.connection()
        .call(move |conn| {
            let at = ts(at);
            conn.execute(
                "UPDATE calendars SET publish_count = publish_count + 1,
                    last_published_at = ?1, updated_at = ?1
                 WHERE id = ?2",
                params![at, calendar_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publish queue queries and state transitions.
//!
//! Slot exclusivity is enforced by the `idx_queue_active_slot` partial unique
//! index; inserts and reschedules that violate it surface as
//! [`CadenceError::SlotTaken`].

use cadence_core::CadenceError;
use cadence_core::types::{
    FailureOutcome, NewQueueItem, Page, QueueFilter, QueueItem, QueueStatus,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::database::{Database, map_tr_err};
use crate::sql::{get_enum, get_json, get_ts, get_ts_opt, is_unique_violation, new_id, to_json, ts};

const ITEM_COLUMNS: &str = "id, user_id, calendar_id, schedule_id, post_id, content_type, \
     social_platforms, social_account_ids, caption, status, priority, assigned_slot_id, \
     scheduled_publish_at, attempts, last_attempt_at, error, published_at, generated_at, \
     created_at, updated_at";

fn item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueItem> {
    Ok(QueueItem {
        id: row.get(0)?,
        user_id: row.get(1)?,
        calendar_id: row.get(2)?,
        schedule_id: row.get(3)?,
        post_id: row.get(4)?,
        content_type: get_enum(row, 5)?,
        social_platforms: get_json(row, 6)?,
        social_account_ids: get_json(row, 7)?,
        caption: row.get(8)?,
        status: get_enum(row, 9)?,
        priority: row.get(10)?,
        assigned_slot_id: row.get(11)?,
        scheduled_publish_at: get_ts(row, 12)?,
        attempts: row.get(13)?,
        last_attempt_at: get_ts_opt(row, 14)?,
        error: row.get(15)?,
        published_at: get_ts_opt(row, 16)?,
        generated_at: get_ts(row, 17)?,
        created_at: get_ts(row, 18)?,
        updated_at: get_ts(row, 19)?,
    })
}

fn load_item(conn: &Connection, id: &str) -> rusqlite::Result<Option<QueueItem>> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM queue_items WHERE id = ?1"),
        params![id],
        item_from_row,
    )
    .optional()
}

fn slot_taken(calendar_id: String, publish_at: DateTime<Utc>) -> CadenceError {
    CadenceError::SlotTaken {
        calendar_id,
        publish_at,
    }
}

/// Inserts a `queued` item at its assigned slot.
pub async fn insert_item(
    db: &Database,
    item: &NewQueueItem,
    now: DateTime<Utc>,
) -> Result<QueueItem, CadenceError> {
    let item = item.clone();
    let calendar_id = item.request.calendar_id.clone();
    let publish_at = item.scheduled_publish_at;
    let id = new_id();

    let inserted = db
        .connection()
        .call(move |conn| {
            let req = &item.request;
            let now = ts(now);
            let result = conn.execute(
                "INSERT INTO queue_items (id, user_id, calendar_id, schedule_id, post_id,
                    content_type, social_platforms, social_account_ids, caption, status, priority,
                    assigned_slot_id, scheduled_publish_at, attempts, generated_at,
                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'queued', ?10, ?11, ?12, 0, ?13,
                    ?14, ?14)",
                params![
                    id,
                    req.user_id,
                    req.calendar_id,
                    req.schedule_id,
                    req.post_id,
                    req.content_type.to_string(),
                    to_json(&req.social_platforms)?,
                    to_json(&req.social_account_ids)?,
                    req.caption,
                    req.priority,
                    item.assigned_slot_id,
                    ts(item.scheduled_publish_at),
                    ts(item.generated_at),
                    now
                ],
            );
            match result {
                Ok(_) => load_item(conn, &id),
                Err(e) if is_unique_violation(&e) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;

    inserted.ok_or_else(|| slot_taken(calendar_id, publish_at))
}

pub async fn get_item(db: &Database, id: &str) -> Result<Option<QueueItem>, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| load_item(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// Point query for an active item holding `publish_at` on the calendar.
pub async fn is_slot_taken(
    db: &Database,
    calendar_id: &str,
    publish_at: DateTime<Utc>,
    exclude_id: Option<&str>,
) -> Result<bool, CadenceError> {
    let calendar_id = calendar_id.to_string();
    let exclude_id = exclude_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM queue_items
                    WHERE calendar_id = ?1 AND scheduled_publish_at = ?2
                      AND status IN ('queued', 'processing')
                      AND (?3 IS NULL OR id != ?3))",
                params![calendar_id, ts(publish_at), exclude_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn ready_items(
    db: &Database,
    now: DateTime<Utc>,
) -> Result<Vec<QueueItem>, CadenceError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM queue_items
                 WHERE status = 'queued' AND scheduled_publish_at <= ?1
                 ORDER BY priority DESC, scheduled_publish_at ASC, created_at ASC"
            ))?;
            stmt.query_map(params![ts(now)], item_from_row)?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// `queued -> processing`. Returns `false` if the item was no longer queued.
pub async fn claim_item(db: &Database, id: &str, at: DateTime<Utc>) -> Result<bool, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let at = ts(at);
            let changed = conn.execute(
                "UPDATE queue_items SET status = 'processing', last_attempt_at = ?1, updated_at = ?1
                 WHERE id = ?2 AND status = 'queued'",
                params![at, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Marks an active item published and clears any earlier error.
pub async fn mark_published(
    db: &Database,
    id: &str,
    at: DateTime<Utc>,
) -> Result<bool, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let at = ts(at);
            let changed = conn.execute(
                "UPDATE queue_items SET status = 'published', published_at = ?1, error = NULL,
                    updated_at = ?1
                 WHERE id = ?2 AND status IN ('queued', 'processing')",
                params![at, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Counts a failed attempt against an active item.
pub async fn record_failure(
    db: &Database,
    id: &str,
    reason: &str,
    max_attempts: u32,
    at: DateTime<Utc>,
) -> Result<Option<FailureOutcome>, CadenceError> {
    let id = id.to_string();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            let at = ts(at);
            conn.query_row(
                "UPDATE queue_items SET
                    attempts = attempts + 1,
                    status = CASE WHEN attempts + 1 >= ?1 THEN 'failed' ELSE 'queued' END,
                    error = ?2, last_attempt_at = ?3, updated_at = ?3
                 WHERE id = ?4 AND status IN ('queued', 'processing')
                 RETURNING status, attempts",
                params![max_attempts, reason, at, id],
                |row| {
                    Ok(FailureOutcome {
                        status: get_enum(row, 0)?,
                        attempts: row.get(1)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn mark_failed_permanently(
    db: &Database,
    id: &str,
    reason: &str,
    at: DateTime<Utc>,
) -> Result<bool, CadenceError> {
    let id = id.to_string();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            let at = ts(at);
            let changed = conn.execute(
                "UPDATE queue_items SET status = 'failed', attempts = attempts + 1,
                    error = ?1, last_attempt_at = ?2, updated_at = ?2
                 WHERE id = ?3 AND status IN ('queued', 'processing')",
                params![reason, at, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn cancel_item(
    db: &Database,
    id: &str,
    user_id: &str,
    at: DateTime<Utc>,
) -> Result<bool, CadenceError> {
    let id = id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE queue_items SET status = 'cancelled', updated_at = ?1
                 WHERE id = ?2 AND user_id = ?3 AND status IN ('queued', 'failed')",
                params![ts(at), id, user_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_item(db: &Database, id: &str, user_id: &str) -> Result<bool, CadenceError> {
    let id = id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM queue_items WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_priority(
    db: &Database,
    id: &str,
    user_id: &str,
    priority: i32,
    at: DateTime<Utc>,
) -> Result<bool, CadenceError> {
    let id = id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE queue_items SET priority = ?1, updated_at = ?2
                 WHERE id = ?3 AND user_id = ?4 AND status = 'queued'",
                params![priority, ts(at), id, user_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Moves a queued item to a new publish time.
pub async fn reschedule_item(
    db: &Database,
    id: &str,
    publish_at: DateTime<Utc>,
    at: DateTime<Utc>,
) -> Result<bool, CadenceError> {
    let id = id.to_string();

    // Outer None: the item is gone. Inner None: the new time is taken.
    let outcome: Option<(String, Option<bool>)> = db
        .connection()
        .call(move |conn| {
            let Some(calendar_id) = conn
                .query_row(
                    "SELECT calendar_id FROM queue_items WHERE id = ?1",
                    params![id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
            else {
                return Ok(None);
            };
            let result = conn.execute(
                "UPDATE queue_items SET scheduled_publish_at = ?1, updated_at = ?2
                 WHERE id = ?3 AND status = 'queued'",
                params![ts(publish_at), ts(at), id],
            );
            match result {
                Ok(changed) => Ok(Some((calendar_id, Some(changed > 0)))),
                Err(e) if is_unique_violation(&e) => Ok(Some((calendar_id, None))),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        None => Ok(false),
        Some((_, Some(changed))) => Ok(changed),
        Some((calendar_id, None)) => Err(slot_taken(calendar_id, publish_at)),
    }
}

/// Paged listing ordered by publish time.
pub async fn list_items(
    db: &Database,
    user_id: Option<&str>,
    filter: &QueueFilter,
) -> Result<Page<QueueItem>, CadenceError> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(user_id) = user_id {
        values.push(user_id.to_string());
        clauses.push(format!("user_id = ?{}", values.len()));
    }
    if let Some(calendar_id) = &filter.calendar_id {
        values.push(calendar_id.clone());
        clauses.push(format!("calendar_id = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(status.to_string());
        clauses.push(format!("status = ?{}", values.len()));
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let page = filter.page;

    let (items, total) = db
        .connection()
        .call(move |conn| {
            let total: u64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM queue_items {where_sql}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM queue_items {where_sql}
                 ORDER BY scheduled_publish_at ASC, id ASC
                 LIMIT {} OFFSET {}",
                page.limit,
                page.offset()
            ))?;
            let items = stmt
                .query_map(params_from_iter(values.iter()), item_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok((items, total))
        })
        .await
        .map_err(map_tr_err)?;

    Ok(Page::new(items, page.page, page.limit, total))
}

pub async fn upcoming_items(
    db: &Database,
    calendar_id: &str,
    now: DateTime<Utc>,
    limit: u32,
) -> Result<Vec<QueueItem>, CadenceError> {
    let calendar_id = calendar_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM queue_items
                 WHERE calendar_id = ?1 AND status = 'queued' AND scheduled_publish_at >= ?2
                 ORDER BY scheduled_publish_at ASC
                 LIMIT ?3"
            ))?;
            stmt.query_map(params![calendar_id, ts(now), limit], item_from_row)?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn processing_items(db: &Database) -> Result<Vec<QueueItem>, CadenceError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM queue_items
                 WHERE status = ?1 ORDER BY scheduled_publish_at ASC"
            ))?;
            stmt.query_map(params![QueueStatus::Processing.to_string()], item_from_row)?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schedule queries.
//!
//! Both schedule kinds share one table. Timing columns that do not apply to a
//! row's kind are left NULL.

use std::collections::BTreeMap;

use cadence_core::CadenceError;
use cadence_core::types::{
    ExecutionRecord, NewSchedule, Page, Schedule, ScheduleAction, ScheduleFilter, ScheduleKind,
    ScheduleStats, ScheduleStatus, ScheduleTiming,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::database::{Database, map_tr_err};
use crate::sql::{get_enum, get_json, get_json_opt, get_ts, get_ts_opt, new_id, to_json, ts, ts_opt};

const SCHEDULE_COLUMNS: &str = "id, user_id, kind, description, action, scheduled_for, \
     cron_expression, max_executions, end_date, next_execution_at, mutation_enabled, status, \
     execution_count, last_executed_at, last_error, last_result, created_at, updated_at";

fn schedule_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Schedule> {
    let kind: ScheduleKind = get_enum(row, 2)?;
    let timing = match kind {
        ScheduleKind::Single => {
            let scheduled_for = get_ts_opt(row, 5)?.ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Null,
                    "single schedule without scheduled_for".into(),
                )
            })?;
            ScheduleTiming::Single { scheduled_for }
        }
        ScheduleKind::Recurring => ScheduleTiming::Recurring {
            cron_expression: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            max_executions: row.get(7)?,
            end_date: get_ts_opt(row, 8)?,
            next_execution_at: get_ts_opt(row, 9)?,
        },
    };
    Ok(Schedule {
        id: row.get(0)?,
        user_id: row.get(1)?,
        description: row.get(3)?,
        action: get_json(row, 4)?,
        timing,
        mutation_enabled: row.get(10)?,
        status: get_enum(row, 11)?,
        execution_count: row.get(12)?,
        last_executed_at: get_ts_opt(row, 13)?,
        last_error: row.get(14)?,
        last_result: get_json_opt(row, 15)?,
        created_at: get_ts(row, 16)?,
        updated_at: get_ts(row, 17)?,
    })
}

fn load_schedule(conn: &Connection, id: &str) -> rusqlite::Result<Option<Schedule>> {
    conn.query_row(
        &format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?1"),
        params![id],
        schedule_from_row,
    )
    .optional()
}

/// Column values for the timing of a schedule.
struct TimingColumns {
    kind: String,
    scheduled_for: Option<String>,
    cron_expression: Option<String>,
    max_executions: Option<u32>,
    end_date: Option<String>,
    next_execution_at: Option<String>,
}

impl From<&ScheduleTiming> for TimingColumns {
    fn from(timing: &ScheduleTiming) -> Self {
        match timing {
            ScheduleTiming::Single { scheduled_for } => Self {
                kind: ScheduleKind::Single.to_string(),
                scheduled_for: Some(ts(*scheduled_for)),
                cron_expression: None,
                max_executions: None,
                end_date: None,
                next_execution_at: None,
            },
            ScheduleTiming::Recurring {
                cron_expression,
                max_executions,
                end_date,
                next_execution_at,
            } => Self {
                kind: ScheduleKind::Recurring.to_string(),
                scheduled_for: None,
                cron_expression: Some(cron_expression.clone()),
                max_executions: *max_executions,
                end_date: ts_opt(*end_date),
                next_execution_at: ts_opt(*next_execution_at),
            },
        }
    }
}

fn action_columns(action: &ScheduleAction) -> rusqlite::Result<(String, String)> {
    Ok((action.action_type().to_string(), to_json(action)?))
}

pub async fn create_schedule(
    db: &Database,
    input: &NewSchedule,
    now: DateTime<Utc>,
) -> Result<Schedule, CadenceError> {
    let input = input.clone();
    let id = new_id();
    db.connection()
        .call(move |conn| {
            let timing = TimingColumns::from(&input.timing);
            let (action_type, action) = action_columns(&input.action)?;
            conn.execute(
                "INSERT INTO schedules (id, user_id, kind, description, action_type, action,
                    scheduled_for, cron_expression, max_executions, end_date, next_execution_at,
                    mutation_enabled, status, execution_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0, ?14, ?14)",
                params![
                    id,
                    input.user_id,
                    timing.kind,
                    input.description,
                    action_type,
                    action,
                    timing.scheduled_for,
                    timing.cron_expression,
                    timing.max_executions,
                    timing.end_date,
                    timing.next_execution_at,
                    input.mutation_enabled,
                    input.status.to_string(),
                    ts(now)
                ],
            )?;
            load_schedule(conn, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_schedule(db: &Database, id: &str) -> Result<Option<Schedule>, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| load_schedule(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// A user's schedules, newest first.
pub async fn list_schedules(
    db: &Database,
    user_id: &str,
    filter: &ScheduleFilter,
) -> Result<Page<Schedule>, CadenceError> {
    let mut clauses = vec!["user_id = ?1".to_string()];
    let mut values = vec![user_id.to_string()];
    if let Some(kind) = filter.kind {
        values.push(kind.to_string());
        clauses.push(format!("kind = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(status.to_string());
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(action_type) = filter.action_type {
        values.push(action_type.to_string());
        clauses.push(format!("action_type = ?{}", values.len()));
    }
    let where_sql = clauses.join(" AND ");
    let page = filter.page;

    let (items, total) = db
        .connection()
        .call(move |conn| {
            let total: u64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM schedules WHERE {where_sql}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE {where_sql}
                 ORDER BY created_at DESC, id ASC
                 LIMIT {} OFFSET {}",
                page.limit,
                page.offset()
            ))?;
            let items = stmt
                .query_map(params_from_iter(values.iter()), schedule_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok((items, total))
        })
        .await
        .map_err(map_tr_err)?;

    Ok(Page::new(items, page.page, page.limit, total))
}

pub async fn schedule_stats(db: &Database, user_id: &str) -> Result<ScheduleStats, CadenceError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT kind, status, COUNT(*), COALESCE(SUM(execution_count), 0)
                 FROM schedules WHERE user_id = ?1
                 GROUP BY kind, status",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok((
                    get_enum::<ScheduleKind>(row, 0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u64>(2)?,
                    row.get::<_, u64>(3)?,
                ))
            })?;

            let mut stats = ScheduleStats {
                by_status: BTreeMap::new(),
                ..Default::default()
            };
            for row in rows {
                let (kind, status, count, executions) = row?;
                stats.total += count;
                stats.total_executions += executions;
                match kind {
                    ScheduleKind::Single => stats.single += count,
                    ScheduleKind::Recurring => stats.recurring += count,
                }
                *stats.by_status.entry(status).or_insert(0) += count;
            }
            Ok(stats)
        })
        .await
        .map_err(map_tr_err)
}

async fn due_by(
    db: &Database,
    kind: ScheduleKind,
    status: ScheduleStatus,
    due_column: &'static str,
    now: DateTime<Utc>,
) -> Result<Vec<Schedule>, CadenceError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedules
                 WHERE kind = ?1 AND status = ?2 AND {due_column} IS NOT NULL
                   AND {due_column} <= ?3
                 ORDER BY {due_column} ASC, created_at ASC"
            ))?;
            stmt.query_map(
                params![kind.to_string(), status.to_string(), ts(now)],
                schedule_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn due_single(db: &Database, now: DateTime<Utc>) -> Result<Vec<Schedule>, CadenceError> {
    due_by(db, ScheduleKind::Single, ScheduleStatus::Pending, "scheduled_for", now).await
}

pub async fn due_recurring(
    db: &Database,
    now: DateTime<Utc>,
) -> Result<Vec<Schedule>, CadenceError> {
    due_by(
        db,
        ScheduleKind::Recurring,
        ScheduleStatus::Active,
        "next_execution_at",
        now,
    )
    .await
}

/// Compare-and-set on status.
pub async fn transition(
    db: &Database,
    id: &str,
    from: &[ScheduleStatus],
    to: ScheduleStatus,
    at: DateTime<Utc>,
) -> Result<bool, CadenceError> {
    if from.is_empty() {
        return Ok(false);
    }
    let mut values: Vec<String> = vec![to.to_string(), ts(at), id.to_string()];
    let placeholders: Vec<String> = from
        .iter()
        .map(|status| {
            values.push(status.to_string());
            format!("?{}", values.len())
        })
        .collect();
    let sql = format!(
        "UPDATE schedules SET status = ?1, updated_at = ?2
         WHERE id = ?3 AND status IN ({})",
        placeholders.join(", ")
    );
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Writes an execution outcome and bumps `execution_count`.
pub async fn record_execution(
    db: &Database,
    id: &str,
    record: &ExecutionRecord,
) -> Result<bool, CadenceError> {
    let id = id.to_string();
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            let last_result = record.result.data.as_ref().map(to_json).transpose()?;
            let at = ts(record.executed_at);
            let changed = conn.execute(
                "UPDATE schedules SET
                    status = ?1,
                    execution_count = execution_count + 1,
                    last_executed_at = ?2,
                    last_error = ?3,
                    last_result = ?4,
                    next_execution_at = CASE WHEN kind = 'recurring' THEN ?5 ELSE NULL END,
                    updated_at = ?2
                 WHERE id = ?6",
                params![
                    record.status.to_string(),
                    at,
                    record.result.error,
                    last_result,
                    ts_opt(record.next_execution_at),
                    id
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrites the editable columns from an in-memory schedule.
pub async fn replace_schedule(db: &Database, schedule: &Schedule) -> Result<bool, CadenceError> {
    let schedule = schedule.clone();
    db.connection()
        .call(move |conn| {
            let timing = TimingColumns::from(&schedule.timing);
            let (action_type, action) = action_columns(&schedule.action)?;
            let changed = conn.execute(
                "UPDATE schedules SET
                    description = ?1, action_type = ?2, action = ?3,
                    scheduled_for = ?4, cron_expression = ?5, max_executions = ?6,
                    end_date = ?7, next_execution_at = ?8,
                    mutation_enabled = ?9, status = ?10, updated_at = ?11
                 WHERE id = ?12 AND kind = ?13",
                params![
                    schedule.description,
                    action_type,
                    action,
                    timing.scheduled_for,
                    timing.cron_expression,
                    timing.max_executions,
                    timing.end_date,
                    timing.next_execution_at,
                    schedule.mutation_enabled,
                    schedule.status.to_string(),
                    ts(schedule.updated_at),
                    schedule.id,
                    timing.kind
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_schedule(db: &Database, id: &str) -> Result<bool, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute("DELETE FROM schedules WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn running_schedules(db: &Database) -> Result<Vec<Schedule>, CadenceError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE status = ?1 ORDER BY updated_at ASC"
            ))?;
            stmt.query_map(params![ScheduleStatus::Running.to_string()], schedule_from_row)?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::types::{ExecutionResult, GenerationSpec, PageRequest};
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, hour, 0, 0).unwrap()
    }

    fn single(user: &str, scheduled_for: DateTime<Utc>) -> NewSchedule {
        NewSchedule {
            user_id: user.into(),
            description: Some("one-off".into()),
            action: ScheduleAction::GenerateImage(GenerationSpec::new("a red fox")),
            timing: ScheduleTiming::Single { scheduled_for },
            mutation_enabled: false,
            status: ScheduleStatus::Pending,
        }
    }

    fn recurring(user: &str, next: DateTime<Utc>) -> NewSchedule {
        NewSchedule {
            user_id: user.into(),
            description: None,
            action: ScheduleAction::PublishPost {
                post_id: "post-1".into(),
            },
            timing: ScheduleTiming::Recurring {
                cron_expression: "0 9 * * *".into(),
                max_executions: Some(3),
                end_date: None,
                next_execution_at: Some(next),
            },
            mutation_enabled: true,
            status: ScheduleStatus::Active,
        }
    }

    #[tokio::test]
    async fn timing_round_trips_per_kind() {
        let db = Database::open_in_memory().await.unwrap();
        let s = create_schedule(&db, &single("u1", at(5, 9)), at(1, 0)).await.unwrap();
        let r = create_schedule(&db, &recurring("u1", at(5, 9)), at(1, 0)).await.unwrap();

        assert_eq!(s.timing, ScheduleTiming::Single { scheduled_for: at(5, 9) });
        assert_eq!(r.kind(), ScheduleKind::Recurring);
        assert_eq!(r.timing.due_at(), Some(at(5, 9)));
        assert_eq!(
            get_schedule(&db, &r.id).await.unwrap().unwrap().action,
            ScheduleAction::PublishPost {
                post_id: "post-1".into()
            }
        );
    }

    #[tokio::test]
    async fn due_queries_respect_kind_status_and_time() {
        let db = Database::open_in_memory().await.unwrap();
        let due = create_schedule(&db, &single("u1", at(5, 9)), at(1, 0)).await.unwrap();
        create_schedule(&db, &single("u1", at(6, 9)), at(1, 0)).await.unwrap();
        let rec = create_schedule(&db, &recurring("u1", at(5, 8)), at(1, 0)).await.unwrap();

        let singles = due_single(&db, at(5, 12)).await.unwrap();
        assert_eq!(singles.len(), 1);
        assert_eq!(singles[0].id, due.id);

        let recs = due_recurring(&db, at(5, 12)).await.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].id, rec.id);

        assert!(
            transition(&db, &due.id, &[ScheduleStatus::Pending], ScheduleStatus::Paused, at(2, 0))
                .await
                .unwrap()
        );
        assert!(due_single(&db, at(5, 12)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transition_is_conditional() {
        let db = Database::open_in_memory().await.unwrap();
        let s = create_schedule(&db, &single("u1", at(5, 9)), at(1, 0)).await.unwrap();
        assert!(
            !transition(&db, &s.id, &[ScheduleStatus::Active], ScheduleStatus::Running, at(5, 9))
                .await
                .unwrap()
        );
        assert!(
            transition(
                &db,
                &s.id,
                &[ScheduleStatus::Pending, ScheduleStatus::Active],
                ScheduleStatus::Running,
                at(5, 9)
            )
            .await
            .unwrap()
        );
        assert_eq!(running_schedules(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn record_execution_counts_and_stores_result() {
        let db = Database::open_in_memory().await.unwrap();
        let r = create_schedule(&db, &recurring("u1", at(5, 9)), at(1, 0)).await.unwrap();
        let record = ExecutionRecord {
            status: ScheduleStatus::Active,
            executed_at: at(5, 9),
            result: ExecutionResult::success(serde_json::json!({"postId": "post-1"})),
            next_execution_at: Some(at(6, 9)),
        };
        assert!(record_execution(&db, &r.id, &record).await.unwrap());

        let loaded = get_schedule(&db, &r.id).await.unwrap().unwrap();
        assert_eq!(loaded.execution_count, 1);
        assert_eq!(loaded.last_executed_at, Some(at(5, 9)));
        assert_eq!(loaded.timing.due_at(), Some(at(6, 9)));
        assert_eq!(loaded.last_result, Some(serde_json::json!({"postId": "post-1"})));
        assert!(loaded.last_error.is_none());
    }

    #[tokio::test]
    async fn stats_and_listing_are_scoped_to_user() {
        let db = Database::open_in_memory().await.unwrap();
        create_schedule(&db, &single("u1", at(5, 9)), at(1, 0)).await.unwrap();
        create_schedule(&db, &single("u1", at(6, 9)), at(1, 1)).await.unwrap();
        create_schedule(&db, &recurring("u1", at(5, 9)), at(1, 2)).await.unwrap();
        create_schedule(&db, &single("u2", at(5, 9)), at(1, 3)).await.unwrap();

        let stats = schedule_stats(&db, "u1").await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.single, 2);
        assert_eq!(stats.recurring, 1);
        assert_eq!(stats.count(ScheduleStatus::Pending), 2);
        assert_eq!(stats.count(ScheduleStatus::Active), 1);

        let filter = ScheduleFilter {
            kind: Some(ScheduleKind::Single),
            page: PageRequest::new(1, 10),
            ..Default::default()
        };
        let page = list_schedules(&db, "u1", &filter).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].timing.due_at(), Some(at(6, 9)));
    }

    #[tokio::test]
    async fn replace_rewrites_editable_fields() {
        let db = Database::open_in_memory().await.unwrap();
        let mut s = create_schedule(&db, &single("u1", at(5, 9)), at(1, 0)).await.unwrap();
        s.timing = ScheduleTiming::Single { scheduled_for: at(7, 9) };
        s.description = Some("moved".into());
        s.updated_at = at(2, 0);
        assert!(replace_schedule(&db, &s).await.unwrap());

        let loaded = get_schedule(&db, &s.id).await.unwrap().unwrap();
        assert_eq!(loaded.timing.due_at(), Some(at(7, 9)));
        assert_eq!(loaded.description.as_deref(), Some("moved"));
        assert!(delete_schedule(&db, &s.id).await.unwrap());
        assert!(get_schedule(&db, &s.id).await.unwrap().is_none());
    }
}

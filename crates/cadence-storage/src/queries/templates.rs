// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt template queries.

use cadence_core::CadenceError;
use cadence_core::types::{NewPromptTemplate, PromptTemplate};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::sql::{get_enum, get_json, get_ts, get_ts_opt, new_id, to_json, ts};

const TEMPLATE_COLUMNS: &str = "id, user_id, name, base_prompt, category, nsfw, style_category, \
     tags, default_options, usage_count, last_used_at, created_at";

fn template_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PromptTemplate> {
    Ok(PromptTemplate {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        base_prompt: row.get(3)?,
        category: get_enum(row, 4)?,
        nsfw: row.get(5)?,
        style_category: get_enum(row, 6)?,
        tags: get_json(row, 7)?,
        default_options: get_json(row, 8)?,
        usage_count: row.get(9)?,
        last_used_at: get_ts_opt(row, 10)?,
        created_at: get_ts(row, 11)?,
    })
}

fn load_template(conn: &Connection, id: &str) -> rusqlite::Result<Option<PromptTemplate>> {
    conn.query_row(
        &format!("SELECT {TEMPLATE_COLUMNS} FROM prompt_templates WHERE id = ?1"),
        params![id],
        template_from_row,
    )
    .optional()
}

pub async fn create_template(
    db: &Database,
    template: &NewPromptTemplate,
    now: DateTime<Utc>,
) -> Result<PromptTemplate, CadenceError> {
    let template = template.clone();
    let id = new_id();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO prompt_templates (id, user_id, name, base_prompt, category, nsfw,
                    style_category, tags, default_options, usage_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)",
                params![
                    id,
                    template.user_id,
                    template.name,
                    template.base_prompt,
                    template.category.to_string(),
                    template.nsfw,
                    template.style_category.to_string(),
                    to_json(&template.tags)?,
                    to_json(&template.default_options)?,
                    ts(now)
                ],
            )?;
            load_template(conn, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_template(db: &Database, id: &str) -> Result<Option<PromptTemplate>, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| load_template(conn, &id))
        .await
        .map_err(map_tr_err)
}

pub async fn record_template_use(
    db: &Database,
    id: &str,
    at: DateTime<Utc>,
) -> Result<(), CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE prompt_templates SET usage_count = usage_count + 1, last_used_at = ?1
                 WHERE id = ?2",
                params![ts(at), id],
            )
            .map(|_| ())
        })
        .await
        .map_err(map_tr_err)
}

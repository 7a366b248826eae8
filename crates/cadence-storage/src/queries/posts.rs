// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post queries.

use cadence_core::CadenceError;
use cadence_core::types::{NewPost, Post, PostStatus};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::sql::{get_enum, get_json, get_json_opt, get_ts, get_ts_opt, new_id, to_json, ts};

const POST_COLUMNS: &str = "id, user_id, content_type, content, nsfw, status, social_platforms, \
     mutation, published_at, created_at, updated_at";

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content_type: get_enum(row, 2)?,
        content: get_json(row, 3)?,
        nsfw: row.get(4)?,
        status: get_enum(row, 5)?,
        social_platforms: get_json(row, 6)?,
        mutation: get_json_opt(row, 7)?,
        published_at: get_ts_opt(row, 8)?,
        created_at: get_ts(row, 9)?,
        updated_at: get_ts(row, 10)?,
    })
}

fn load_post(conn: &Connection, id: &str) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
        params![id],
        post_from_row,
    )
    .optional()
}

/// Inserts a `draft` post.
pub async fn create_post(
    db: &Database,
    post: &NewPost,
    now: DateTime<Utc>,
) -> Result<Post, CadenceError> {
    let post = post.clone();
    let id = new_id();
    db.connection()
        .call(move |conn| {
            let mutation = post.mutation.as_ref().map(to_json).transpose()?;
            conn.execute(
                "INSERT INTO posts (id, user_id, content_type, content, nsfw, status,
                    social_platforms, mutation, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    id,
                    post.user_id,
                    post.content_type.to_string(),
                    to_json(&post.content)?,
                    post.nsfw,
                    PostStatus::Draft.to_string(),
                    to_json(&post.social_platforms)?,
                    mutation,
                    ts(now)
                ],
            )?;
            load_post(conn, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_post(db: &Database, id: &str) -> Result<Option<Post>, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| load_post(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// Sets the status. Becoming `published` stamps `published_at` once.
pub async fn set_post_status(
    db: &Database,
    id: &str,
    status: PostStatus,
    at: DateTime<Utc>,
) -> Result<bool, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let at = ts(at);
            let changed = conn.execute(
                "UPDATE posts SET status = ?1,
                    published_at = CASE WHEN ?1 = 'published' THEN COALESCE(published_at, ?2)
                                        ELSE published_at END,
                    updated_at = ?2
                 WHERE id = ?3",
                params![status.to_string(), at, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::types::{
        AppliedMutation, ContentType, MutationKind, MutationRecord, PostContent,
    };
    use chrono::TimeZone;

    fn new_post() -> NewPost {
        NewPost {
            user_id: "user-1".into(),
            content_type: ContentType::Image,
            content: PostContent {
                image_url: Some("https://cdn.example/a.png".into()),
                prompt: "a lighthouse at dusk, serene".into(),
                ..Default::default()
            },
            nsfw: false,
            social_platforms: vec!["twitter".into(), "instagram".into()],
            mutation: Some(MutationRecord {
                template_id: None,
                template_name: None,
                original_prompt: "a lighthouse at dusk".into(),
                mutations: vec![AppliedMutation {
                    kind: MutationKind::Adjective,
                    pool: Some("mood".into()),
                    value: "serene".into(),
                }],
                seed: 42,
            }),
        }
    }

    #[tokio::test]
    async fn create_and_load_round_trips_json_columns() {
        let db = Database::open_in_memory().await.unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let created = create_post(&db, &new_post(), now).await.unwrap();
        assert_eq!(created.status, PostStatus::Draft);

        let loaded = get_post(&db, &created.id).await.unwrap().unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.media_url(), Some("https://cdn.example/a.png"));
        assert_eq!(loaded.mutation.unwrap().seed, 42);
    }

    #[tokio::test]
    async fn publishing_stamps_published_at_once() {
        let db = Database::open_in_memory().await.unwrap();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 1, 6, 9, 0, 0).unwrap();
        let post = create_post(&db, &new_post(), t0).await.unwrap();

        assert!(set_post_status(&db, &post.id, PostStatus::Published, t0).await.unwrap());
        assert!(set_post_status(&db, &post.id, PostStatus::Published, t1).await.unwrap());
        let loaded = get_post(&db, &post.id).await.unwrap().unwrap();
        assert_eq!(loaded.published_at, Some(t0));
        assert_eq!(loaded.updated_at, t1);

        assert!(!set_post_status(&db, "missing", PostStatus::Failed, t1).await.unwrap());
    }
}

// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publishing profiles and their connected social accounts.

use cadence_core::CadenceError;
use cadence_core::types::{PublishProfile, SocialConnection};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

pub async fn publish_profile(
    db: &Database,
    user_id: &str,
) -> Result<Option<PublishProfile>, CadenceError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let Some(profile_id) = conn
                .query_row(
                    "SELECT profile_id FROM publish_profiles WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
            else {
                return Ok(None);
            };
            let mut stmt = conn.prepare(
                "SELECT platform, account_id FROM social_connections
                 WHERE user_id = ?1 ORDER BY platform, account_id",
            )?;
            let connections = stmt
                .query_map(params![user_id], |row| {
                    Ok(SocialConnection {
                        platform: row.get(0)?,
                        account_id: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(PublishProfile {
                user_id,
                profile_id,
                connections,
            }))
        })
        .await
        .map_err(map_tr_err)
}

/// Replaces a user's profile and connection set.
pub async fn upsert_publish_profile(
    db: &Database,
    profile: &PublishProfile,
) -> Result<(), CadenceError> {
    let profile = profile.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO publish_profiles (user_id, profile_id) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET profile_id = excluded.profile_id",
                params![profile.user_id, profile.profile_id],
            )?;
            tx.execute(
                "DELETE FROM social_connections WHERE user_id = ?1",
                params![profile.user_id],
            )?;
            for connection in &profile.connections {
                tx.execute(
                    "INSERT OR IGNORE INTO social_connections (user_id, platform, account_id)
                     VALUES (?1, ?2, ?3)",
                    params![profile.user_id, connection.platform, connection.account_id],
                )?;
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

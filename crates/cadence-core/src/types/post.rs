// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Posts, publish results and the social accounts they are published to.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ContentType;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Processing,
    Published,
    Failed,
}

/// Media and prompt of a post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostContent {
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// Kind of change a prompt mutation appended.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Style,
    Adjective,
    Quality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMutation {
    pub kind: MutationKind,
    /// Adjective pool the value came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
    pub value: String,
}

/// How a post's prompt was derived, kept so a variation can be reproduced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    pub original_prompt: String,
    pub mutations: Vec<AppliedMutation>,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub content_type: ContentType,
    pub content: PostContent,
    pub nsfw: bool,
    pub status: PostStatus,
    pub social_platforms: Vec<String>,
    pub mutation: Option<MutationRecord>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// The primary media URL for the post's content type.
    pub fn media_url(&self) -> Option<&str> {
        match self.content_type {
            ContentType::Image => self.content.image_url.as_deref(),
            ContentType::Video => self.content.video_url.as_deref(),
        }
    }
}

/// Input for creating a post from generated media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub user_id: String,
    pub content_type: ContentType,
    pub content: PostContent,
    pub nsfw: bool,
    pub social_platforms: Vec<String>,
    pub mutation: Option<MutationRecord>,
}

/// What the publish gateway reports back.
///
/// A refusal (`published == false`) is an ordinary outcome, not an error; the
/// caller decides whether it counts as a failed attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub published: bool,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublishOutcome {
    pub fn success(platforms: Vec<String>, external_id: Option<String>) -> Self {
        Self {
            published: true,
            platforms,
            external_id,
            ..Default::default()
        }
    }

    /// The gateway declined before contacting the network.
    pub fn refused(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Message recorded on the item when publishing did not happen.
    pub fn failure_message(&self) -> String {
        self.reason
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "Publishing failed".to_string())
    }
}

/// A user's connected account on one social platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialConnection {
    pub platform: String,
    pub account_id: String,
}

/// A user's publishing profile and connected accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishProfile {
    pub user_id: String,
    pub profile_id: String,
    pub connections: Vec<SocialConnection>,
}

// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publish queue items and their lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::{PageRequest, Post};

/// Lifecycle of a queue item.
///
/// `queued -> processing -> published | queued | failed`, and
/// `queued | failed -> cancelled`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Queued,
    Processing,
    Published,
    Failed,
    Cancelled,
}

impl QueueStatus {
    /// Statuses that hold a calendar slot.
    pub const ACTIVE: [QueueStatus; 2] = [QueueStatus::Queued, QueueStatus::Processing];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn can_cancel(self) -> bool {
        matches!(self, Self::Queued | Self::Failed)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Image,
    Video,
}

/// A unit of content waiting for its publish time on a calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    pub user_id: String,
    pub calendar_id: String,
    pub schedule_id: Option<String>,
    pub post_id: String,
    pub content_type: ContentType,
    pub social_platforms: Vec<String>,
    pub social_account_ids: Vec<String>,
    pub caption: Option<String>,
    pub status: QueueStatus,
    pub priority: i32,
    pub assigned_slot_id: String,
    pub scheduled_publish_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller input for queuing a post on a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRequest {
    pub user_id: String,
    pub calendar_id: String,
    pub post_id: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub schedule_id: Option<String>,
    #[serde(default)]
    pub social_platforms: Vec<String>,
    #[serde(default)]
    pub social_account_ids: Vec<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

impl QueueRequest {
    pub fn new(
        user_id: impl Into<String>,
        calendar_id: impl Into<String>,
        post_id: impl Into<String>,
        content_type: ContentType,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            calendar_id: calendar_id.into(),
            post_id: post_id.into(),
            content_type,
            schedule_id: None,
            social_platforms: Vec::new(),
            social_account_ids: Vec::new(),
            caption: None,
            priority: 0,
        }
    }
}

/// A fully resolved row ready to be inserted as `queued`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQueueItem {
    pub request: QueueRequest,
    pub assigned_slot_id: String,
    pub scheduled_publish_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
}

/// Filters for the paged queue listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueFilter {
    pub calendar_id: Option<String>,
    pub status: Option<QueueStatus>,
    pub page: PageRequest,
}

/// A queue item with its post, as shown in queue listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    #[serde(flatten)]
    pub item: QueueItem,
    pub post: Option<Post>,
}

/// Result of a failure transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureOutcome {
    pub status: QueueStatus,
    pub attempts: u32,
}

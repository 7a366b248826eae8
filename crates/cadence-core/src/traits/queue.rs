// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue item persistence and state transitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CadenceError;
use crate::types::{FailureOutcome, NewQueueItem, Page, QueueFilter, QueueItem};

/// Persistence for the publish queue.
///
/// Every transition is a single conditional write: it only applies when the
/// row is in the expected state, and the return value says whether it did.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Inserts a `queued` item.
    ///
    /// Fails with [`CadenceError::SlotTaken`] if another active item on the
    /// same calendar already holds `scheduled_publish_at`.
    async fn insert_item(&self, item: &NewQueueItem) -> Result<QueueItem, CadenceError>;

    async fn get_item(&self, item_id: &str) -> Result<Option<QueueItem>, CadenceError>;

    /// Whether an active item on `calendar_id` holds `publish_at`, ignoring
    /// `exclude_id`.
    async fn is_slot_taken(
        &self,
        calendar_id: &str,
        publish_at: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<bool, CadenceError>;

    /// `queued` items due at or before `now`, highest priority first, then
    /// earliest due time.
    async fn ready_items(&self, now: DateTime<Utc>) -> Result<Vec<QueueItem>, CadenceError>;

    /// `queued -> processing`, stamping `lastAttemptAt`.
    async fn claim_item(&self, item_id: &str, at: DateTime<Utc>) -> Result<bool, CadenceError>;

    /// `processing -> published`, stamping `publishedAt`.
    async fn mark_published(&self, item_id: &str, at: DateTime<Utc>)
    -> Result<bool, CadenceError>;

    /// Counts a failed attempt. The item returns to `queued` until
    /// `max_attempts` is reached, then becomes `failed`. `None` if the item
    /// does not exist.
    async fn record_failure(
        &self,
        item_id: &str,
        reason: &str,
        max_attempts: u32,
        at: DateTime<Utc>,
    ) -> Result<Option<FailureOutcome>, CadenceError>;

    /// Moves straight to `failed`, still counting the attempt.
    async fn mark_failed_permanently(
        &self,
        item_id: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, CadenceError>;

    /// `queued | failed -> cancelled` for the owning user.
    async fn cancel_item(
        &self,
        item_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, CadenceError>;

    /// Hard delete for the owning user.
    async fn delete_item(&self, item_id: &str, user_id: &str) -> Result<bool, CadenceError>;

    /// Only applies while `queued` and owned by `user_id`.
    async fn update_priority(
        &self,
        item_id: &str,
        user_id: &str,
        priority: i32,
        at: DateTime<Utc>,
    ) -> Result<bool, CadenceError>;

    /// Moves a `queued` item to `publish_at`. Fails with
    /// [`CadenceError::SlotTaken`] on an exclusivity conflict.
    async fn reschedule_item(
        &self,
        item_id: &str,
        publish_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool, CadenceError>;

    /// Paged listing ordered by due time. `user_id` scopes to one owner.
    async fn list_items(
        &self,
        user_id: Option<&str>,
        filter: &QueueFilter,
    ) -> Result<Page<QueueItem>, CadenceError>;

    /// Next `queued` items on a calendar due after `now`, soonest first.
    async fn upcoming_items(
        &self,
        calendar_id: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<QueueItem>, CadenceError>;

    /// Items left in `processing`, i.e. interrupted mid-publish.
    async fn processing_items(&self) -> Result<Vec<QueueItem>, CadenceError>;
}

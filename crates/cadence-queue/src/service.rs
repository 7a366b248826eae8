// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The publish queue API.
//!
//! Callers hand over a post and a calendar; [`QueueService::add_to_queue`]
//! assigns the next free slot and persists a `queued` item. The remaining
//! operations manage items through their lifecycle with ownership checks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use cadence_config::model::QueueConfig;
use cadence_core::types::{
    Calendar, FailureOutcome, NewQueueItem, Page, QueueEntry, QueueFilter, QueueItem,
    QueueRequest, QueueStatus, SlotAssignment,
};
use cadence_core::{CadenceError, CalendarRepository, Clock, PostStore, QueueRepository};

use crate::slot::{SlotSearch, find_next_slot};

/// Number of items [`QueueService::get_upcoming_queue_items`] returns by default.
pub const DEFAULT_UPCOMING_LIMIT: u32 = 5;

/// Tunables of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Failed attempts before an item becomes `failed`.
    pub max_attempts: u32,
    pub search: SlotSearch,
    /// Extra searches after losing a slot to a concurrent insert.
    pub conflict_retries: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            search: SlotSearch::default(),
            conflict_retries: 5,
        }
    }
}

impl From<&QueueConfig> for QueueSettings {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            search: SlotSearch::from(config),
            conflict_retries: config.slot_conflict_retries,
        }
    }
}

pub struct QueueService {
    calendars: Arc<dyn CalendarRepository>,
    queue: Arc<dyn QueueRepository>,
    posts: Arc<dyn PostStore>,
    clock: Arc<dyn Clock>,
    settings: QueueSettings,
}

impl QueueService {
    pub fn new(
        calendars: Arc<dyn CalendarRepository>,
        queue: Arc<dyn QueueRepository>,
        posts: Arc<dyn PostStore>,
        clock: Arc<dyn Clock>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            calendars,
            queue,
            posts,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> QueueSettings {
        self.settings
    }

    pub(crate) fn repository(&self) -> &dyn QueueRepository {
        self.queue.as_ref()
    }

    pub(crate) fn posts(&self) -> &dyn PostStore {
        self.posts.as_ref()
    }

    pub(crate) fn calendars(&self) -> &dyn CalendarRepository {
        self.calendars.as_ref()
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    async fn owned_calendar(
        &self,
        calendar_id: &str,
        user_id: &str,
    ) -> Result<Calendar, CadenceError> {
        match self.calendars.get_calendar(calendar_id).await? {
            Some(calendar) if calendar.user_id == user_id => Ok(calendar),
            _ => Err(CadenceError::CalendarNotFound {
                calendar_id: calendar_id.to_string(),
            }),
        }
    }

    /// Next free slot on a calendar the user owns, `None` if nothing is free
    /// inside the horizon.
    pub async fn next_available_slot(
        &self,
        calendar_id: &str,
        user_id: &str,
    ) -> Result<Option<SlotAssignment>, CadenceError> {
        let calendar = self.owned_calendar(calendar_id, user_id).await?;
        find_next_slot(&calendar, self.queue.as_ref(), self.clock.now(), self.settings.search).await
    }

    /// Assigns the next free slot and persists a `queued` item.
    ///
    /// A concurrent insert that takes the chosen slot first makes this search
    /// again, up to `conflict_retries` more times.
    pub async fn add_to_queue(&self, request: QueueRequest) -> Result<QueueItem, CadenceError> {
        let calendar = self
            .owned_calendar(&request.calendar_id, &request.user_id)
            .await?;
        if !calendar.is_active {
            return Err(CadenceError::CalendarInactive {
                calendar_id: calendar.id,
            });
        }
        if calendar.enabled_slots().next().is_none() {
            return Err(CadenceError::NoEnabledSlots {
                calendar_id: calendar.id,
            });
        }

        let generated_at = self.clock.now();
        let mut conflicts = 0;
        loop {
            let now = self.clock.now();
            let Some(assignment) =
                find_next_slot(&calendar, self.queue.as_ref(), now, self.settings.search).await?
            else {
                return Err(CadenceError::NoAvailableSlot {
                    calendar_id: calendar.id,
                    horizon_days: self.settings.search.horizon_days,
                });
            };

            let item = NewQueueItem {
                request: request.clone(),
                assigned_slot_id: assignment.slot_id,
                scheduled_publish_at: assignment.publish_at,
                generated_at,
            };
            match self.queue.insert_item(&item).await {
                Ok(item) => {
                    info!(
                        item_id = %item.id,
                        calendar_id = %item.calendar_id,
                        post_id = %item.post_id,
                        publish_at = %item.scheduled_publish_at,
                        "content queued"
                    );
                    return Ok(item);
                }
                Err(CadenceError::SlotTaken { publish_at, .. })
                    if conflicts < self.settings.conflict_retries =>
                {
                    conflicts += 1;
                    warn!(
                        calendar_id = %calendar.id,
                        %publish_at,
                        conflicts,
                        "slot taken concurrently, searching again"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// `queued` items due at or before `before`, in drain order.
    pub async fn get_ready_queue_items(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Vec<QueueItem>, CadenceError> {
        self.queue.ready_items(before).await
    }

    pub async fn get_queue_item(
        &self,
        item_id: &str,
        user_id: &str,
    ) -> Result<QueueItem, CadenceError> {
        match self.queue.get_item(item_id).await? {
            Some(item) if item.user_id == user_id => Ok(item),
            _ => Err(CadenceError::QueueItemNotFound {
                id: item_id.to_string(),
            }),
        }
    }

    pub async fn mark_as_published(&self, item_id: &str) -> Result<bool, CadenceError> {
        self.queue.mark_published(item_id, self.clock.now()).await
    }

    /// Counts a failed attempt; the item is re-queued until the attempt
    /// budget is spent.
    pub async fn mark_as_failed(
        &self,
        item_id: &str,
        reason: &str,
    ) -> Result<Option<FailureOutcome>, CadenceError> {
        let outcome = self
            .queue
            .record_failure(item_id, reason, self.settings.max_attempts, self.clock.now())
            .await?;
        match outcome {
            Some(FailureOutcome {
                status: QueueStatus::Failed,
                attempts,
            }) => warn!(item_id, attempts, reason, "queue item failed permanently"),
            Some(FailureOutcome { attempts, .. }) => {
                info!(item_id, attempts, reason, "queue item re-queued after failure")
            }
            None => debug!(item_id, "failure not recorded, item is not active"),
        }
        Ok(outcome)
    }

    /// Cancels a `queued` or `failed` item. `false` if nothing changed.
    pub async fn remove_from_queue(
        &self,
        item_id: &str,
        user_id: &str,
    ) -> Result<bool, CadenceError> {
        self.queue.cancel_item(item_id, user_id, self.clock.now()).await
    }

    pub async fn delete_queue_item(
        &self,
        item_id: &str,
        user_id: &str,
    ) -> Result<bool, CadenceError> {
        self.queue.delete_item(item_id, user_id).await
    }

    pub async fn update_priority(
        &self,
        item_id: &str,
        user_id: &str,
        priority: i32,
    ) -> Result<bool, CadenceError> {
        self.queue
            .update_priority(item_id, user_id, priority, self.clock.now())
            .await
    }

    /// Moves a `queued` item to a new future time not held by another active
    /// item on the same calendar.
    pub async fn reschedule_item(
        &self,
        item_id: &str,
        user_id: &str,
        publish_at: DateTime<Utc>,
    ) -> Result<QueueItem, CadenceError> {
        let item = self.get_queue_item(item_id, user_id).await?;
        if item.status != QueueStatus::Queued {
            return Err(CadenceError::InvalidState {
                id: item.id,
                status: item.status,
                operation: "reschedule",
            });
        }
        let now = self.clock.now();
        if publish_at <= now {
            return Err(CadenceError::InvalidTime(
                "new publish time must be in the future".into(),
            ));
        }
        if self
            .queue
            .is_slot_taken(&item.calendar_id, publish_at, Some(&item.id))
            .await?
        {
            return Err(CadenceError::SlotTaken {
                calendar_id: item.calendar_id,
                publish_at,
            });
        }
        if !self.queue.reschedule_item(&item.id, publish_at, now).await? {
            return Err(CadenceError::QueueItemNotFound { id: item.id });
        }
        info!(item_id = %item.id, %publish_at, "queue item rescheduled");
        Ok(QueueItem {
            scheduled_publish_at: publish_at,
            updated_at: now,
            ..item
        })
    }

    /// The user's items across calendars, joined with their posts.
    pub async fn get_user_queue_items(
        &self,
        user_id: &str,
        filter: &QueueFilter,
    ) -> Result<Page<QueueEntry>, CadenceError> {
        let page = self.queue.list_items(Some(user_id), filter).await?;
        self.attach_posts(page).await
    }

    /// One calendar's items, `queued` only unless a status is given.
    pub async fn get_calendar_queue(
        &self,
        calendar_id: &str,
        user_id: &str,
        filter: &QueueFilter,
    ) -> Result<Page<QueueEntry>, CadenceError> {
        self.owned_calendar(calendar_id, user_id).await?;
        let filter = QueueFilter {
            calendar_id: Some(calendar_id.to_string()),
            status: Some(filter.status.unwrap_or(QueueStatus::Queued)),
            page: filter.page,
        };
        let page = self.queue.list_items(None, &filter).await?;
        self.attach_posts(page).await
    }

    /// Next `queued` items on a calendar, soonest first.
    pub async fn get_upcoming_queue_items(
        &self,
        calendar_id: &str,
        user_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<QueueEntry>, CadenceError> {
        self.owned_calendar(calendar_id, user_id).await?;
        let items = self
            .queue
            .upcoming_items(
                calendar_id,
                self.clock.now(),
                limit.unwrap_or(DEFAULT_UPCOMING_LIMIT),
            )
            .await?;
        self.entries(items).await
    }

    async fn attach_posts(
        &self,
        mut page: Page<QueueItem>,
    ) -> Result<Page<QueueEntry>, CadenceError> {
        let items = std::mem::take(&mut page.items);
        let entries = self.entries(items).await?;
        Ok(page.with_items(entries))
    }

    async fn entries(&self, items: Vec<QueueItem>) -> Result<Vec<QueueEntry>, CadenceError> {
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let post = self.posts.get_post(&item.post_id).await?;
            entries.push(QueueEntry { item, post });
        }
        Ok(entries)
    }
}

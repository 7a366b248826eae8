// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue processor: drains due items through the publish gateway.
//!
//! Each tick loads the `queued` items that are due, then for each one claims
//! it, loads its post, publishes, and records the outcome. Items are handled
//! one at a time with a pacing delay in between. Publish failures only ever
//! move the item through the retry path; they never abort the tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use cadence_core::types::{Post, PostStatus, PublishOutcome, QueueItem, QueueStatus};
use cadence_core::{
    CadenceError, Clock, DuePoller, DueWork, ItemOutcome, PublishGateway, TickSummary,
};

use crate::service::QueueService;

/// Error recorded on items found in `processing` at startup.
pub const INTERRUPTED_REASON: &str = "interrupted before completion";

/// Publishing of one due queue item.
pub struct QueueWork {
    service: Arc<QueueService>,
    gateway: Arc<dyn PublishGateway>,
    publish_timeout: Duration,
}

enum Attempt {
    /// The referenced post no longer exists.
    Missing,
    /// The post was already published before this item ran.
    AlreadyPublished,
    Published(Post, PublishOutcome),
    Failed(String),
}

impl QueueWork {
    pub fn new(
        service: Arc<QueueService>,
        gateway: Arc<dyn PublishGateway>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            service,
            gateway,
            publish_timeout,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.service.clock().now()
    }

    async fn publish(&self, item: &QueueItem) -> Attempt {
        let post = match self.service.posts().get_post(&item.post_id).await {
            Ok(Some(post)) => post,
            Ok(None) => return Attempt::Missing,
            Err(e) => return Attempt::Failed(e.to_string()),
        };

        if post.status == PostStatus::Published {
            debug!(item_id = %item.id, post_id = %post.id, "post already published");
            return Attempt::AlreadyPublished;
        }

        let mut post = post;
        if !item.social_platforms.is_empty() {
            post.social_platforms = item.social_platforms.clone();
        }

        let published = tokio::time::timeout(self.publish_timeout, self.gateway.publish(&post));
        match published.await {
            Err(_) => Attempt::Failed(
                CadenceError::Timeout {
                    duration: self.publish_timeout,
                }
                .to_string(),
            ),
            Ok(Err(e)) => Attempt::Failed(e.to_string()),
            Ok(Ok(outcome)) if outcome.published => Attempt::Published(post, outcome),
            Ok(Ok(outcome)) => Attempt::Failed(outcome.failure_message()),
        }
    }

    /// Post status and calendar counters after the item is already marked
    /// `published`. Failures here are logged and never re-open the item.
    async fn record_publish(&self, item: &QueueItem, post: &Post, outcome: &PublishOutcome) {
        let at = self.now();
        info!(
            item_id = %item.id,
            post_id = %post.id,
            platforms = ?outcome.platforms,
            external_id = outcome.external_id.as_deref().unwrap_or(""),
            "post published"
        );
        if let Err(e) = self
            .service
            .posts()
            .set_post_status(&post.id, PostStatus::Published, at)
            .await
        {
            warn!(
                item_id = %item.id,
                post_id = %post.id,
                error = %e,
                "failed to mark post published"
            );
        }
        if let Err(e) = self
            .service
            .calendars()
            .increment_publish_count(&item.calendar_id, at)
            .await
        {
            warn!(
                item_id = %item.id,
                calendar_id = %item.calendar_id,
                error = %e,
                "failed to update calendar publish count"
            );
        }
    }

    async fn record_failure(
        &self,
        item: &QueueItem,
        reason: &str,
    ) -> Result<ItemOutcome, CadenceError> {
        let outcome = match self.service.mark_as_failed(&item.id, reason).await? {
            Some(outcome) if outcome.status == QueueStatus::Failed => ItemOutcome::Failed,
            Some(_) => ItemOutcome::Retrying,
            None => ItemOutcome::Skipped,
        };
        Ok(outcome)
    }
}

#[async_trait]
impl DueWork for QueueWork {
    type Item = QueueItem;

    fn label(&self) -> &'static str {
        "queue"
    }

    fn item_id(&self, item: &QueueItem) -> String {
        item.id.clone()
    }

    async fn fetch_due(&self, now: DateTime<Utc>) -> Result<Vec<QueueItem>, CadenceError> {
        self.service.get_ready_queue_items(now).await
    }

    async fn execute(&self, item: QueueItem) -> Result<ItemOutcome, CadenceError> {
        let queue = self.service.repository();
        if !queue.claim_item(&item.id, self.now()).await? {
            debug!(item_id = %item.id, "item no longer queued, skipping");
            return Ok(ItemOutcome::Skipped);
        }

        match self.publish(&item).await {
            Attempt::Missing => {
                let reason = format!("post not found: {}", item.post_id);
                warn!(item_id = %item.id, post_id = %item.post_id, "post missing, failing item");
                queue
                    .mark_failed_permanently(&item.id, &reason, self.now())
                    .await?;
                Ok(ItemOutcome::Failed)
            }
            Attempt::AlreadyPublished => {
                self.service.mark_as_published(&item.id).await?;
                Ok(ItemOutcome::Completed)
            }
            Attempt::Published(post, outcome) => {
                // Leave `processing` before any other write.
                self.service.mark_as_published(&item.id).await?;
                self.record_publish(&item, &post, &outcome).await;
                Ok(ItemOutcome::Completed)
            }
            Attempt::Failed(reason) => {
                warn!(
                    item_id = %item.id,
                    attempts = item.attempts + 1,
                    reason = %reason,
                    "publish attempt failed"
                );
                self.record_failure(&item, &reason).await
            }
        }
    }
}

/// Owns the queue poller and the startup recovery pass.
pub struct QueueProcessor {
    poller: DuePoller<QueueWork>,
}

impl QueueProcessor {
    pub fn new(work: QueueWork, clock: Arc<dyn Clock>, pacing: Duration) -> Self {
        Self {
            poller: DuePoller::new(work, clock, pacing),
        }
    }

    /// One drain pass over the due items. Safe to call on an empty queue.
    pub async fn process_calendar_queue(&self) -> TickSummary {
        self.poller.tick().await
    }

    /// Sends items left in `processing` by a crash back through the failure
    /// path. Returns how many were recovered.
    pub async fn recover_interrupted(&self) -> Result<usize, CadenceError> {
        let work = self.poller.work();
        let stuck = work.service.repository().processing_items().await?;
        for item in &stuck {
            work.record_failure(item, INTERRUPTED_REASON).await?;
        }
        if !stuck.is_empty() {
            info!(count = stuck.len(), "recovered interrupted queue items");
        }
        Ok(stuck.len())
    }
}

// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the publish queue and its processor.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tracing_test::traced_test;

use cadence_core::types::{
    ContentType, NewPost, NewSlot, Post, PostStatus, PublishOutcome, QueueFilter, QueueItem,
    QueueRequest, QueueStatus,
};
use cadence_core::{CadenceError, CalendarRepository, PostStore, QueueRepository};
use cadence_queue::processor::INTERRUPTED_REASON;
use cadence_queue::{QueueProcessor, QueueService, QueueSettings, QueueWork};
use cadence_storage::SqliteStorage;
use cadence_test_utils::TestHarness;

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, day, hour, minute, 0).unwrap()
}

/// Monday 09:00, the harness starts at Monday 2026-01-05 08:00 UTC.
fn monday_nine() -> Vec<NewSlot> {
    vec![NewSlot::new(1, 9, 0)]
}

async fn queue(harness: &TestHarness, calendar_id: &str, post: &Post, priority: i32) -> QueueItem {
    let mut request = QueueRequest::new("u1", calendar_id, &post.id, ContentType::Image);
    request.priority = priority;
    harness.queue.add_to_queue(request).await.unwrap()
}

#[tokio::test]
async fn queued_item_publishes_at_its_slot() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let post = h.create_post("u1", &["twitter"]).await.unwrap();

    let item = queue(&h, &calendar.id, &post, 0).await;
    assert_eq!(item.scheduled_publish_at, at(5, 9, 0));
    assert_eq!(item.status, QueueStatus::Queued);

    let early = h.queue_processor.process_calendar_queue().await;
    assert!(early.is_idle());
    assert_eq!(h.gateway.call_count().await, 0);

    h.clock.set(at(5, 9, 0));
    let summary = h.queue_processor.process_calendar_queue().await;
    assert_eq!(summary.completed, 1);

    let item = h.queue.get_queue_item(&item.id, "u1").await.unwrap();
    assert_eq!(item.status, QueueStatus::Published);
    assert_eq!(item.published_at, Some(at(5, 9, 0)));
    let post = h.storage.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Published);
    let calendar = h.storage.get_calendar(&calendar.id).await.unwrap().unwrap();
    assert_eq!(calendar.publish_count, 1);
    assert_eq!(calendar.last_published_at, Some(at(5, 9, 0)));
}

#[tokio::test]
async fn second_item_takes_the_following_week() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let a = queue(&h, &calendar.id, &h.create_post("u1", &["x"]).await.unwrap(), 0).await;
    let b = queue(&h, &calendar.id, &h.create_post("u1", &["x"]).await.unwrap(), 0).await;
    assert_eq!(a.scheduled_publish_at, at(5, 9, 0));
    assert_eq!(b.scheduled_publish_at, at(12, 9, 0));
}

#[tokio::test]
async fn exhausted_horizon_reports_no_available_slot() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    // Mondays inside 14 days of Jan 5: the 5th, 12th and 19th.
    for _ in 0..3 {
        queue(&h, &calendar.id, &h.create_post("u1", &["x"]).await.unwrap(), 0).await;
    }
    let post = h.create_post("u1", &["x"]).await.unwrap();
    let err = h
        .queue
        .add_to_queue(QueueRequest::new("u1", &calendar.id, &post.id, ContentType::Image))
        .await
        .unwrap_err();
    assert!(matches!(err, CadenceError::NoAvailableSlot { horizon_days: 14, .. }));
}

#[tokio::test]
async fn inactive_and_empty_calendars_are_rejected() {
    let h = TestHarness::new().await.unwrap();
    let empty = h.create_calendar("u1", "UTC", vec![]).await.unwrap();
    let post = h.create_post("u1", &["x"]).await.unwrap();
    let request = |calendar_id: &str| {
        QueueRequest::new("u1", calendar_id, &post.id, ContentType::Image)
    };
    assert!(matches!(
        h.queue.add_to_queue(request(&empty.id)).await,
        Err(CadenceError::NoEnabledSlots { .. })
    ));

    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    h.calendars
        .update_calendar(
            &calendar.id,
            "u1",
            &cadence_core::types::CalendarUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        h.queue.add_to_queue(request(&calendar.id)).await,
        Err(CadenceError::CalendarInactive { .. })
    ));
}

#[tokio::test]
#[traced_test]
async fn refused_publish_retries_until_the_budget_is_spent() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let post = h.create_post("u1", &["instagram"]).await.unwrap();
    let item = queue(&h, &calendar.id, &post, 0).await;
    for _ in 0..3 {
        h.gateway.push_outcome(PublishOutcome::refused("no_profile")).await;
    }
    h.clock.set(at(5, 9, 0));

    for attempt in 1..=2 {
        let summary = h.queue_processor.process_calendar_queue().await;
        assert_eq!(summary.retrying, 1);
        let current = h.queue.get_queue_item(&item.id, "u1").await.unwrap();
        assert_eq!(current.status, QueueStatus::Queued);
        assert_eq!(current.attempts, attempt);
        assert_eq!(current.error.as_deref(), Some("no_profile"));
    }

    let summary = h.queue_processor.process_calendar_queue().await;
    assert_eq!(summary.failed, 1);
    let failed = h.queue.get_queue_item(&item.id, "u1").await.unwrap();
    assert_eq!(failed.status, QueueStatus::Failed);
    assert_eq!(failed.attempts, 3);

    assert!(h.queue_processor.process_calendar_queue().await.is_idle());
    assert_eq!(h.gateway.call_count().await, 3);
    assert!(logs_contain("publish attempt failed"));
    assert!(logs_contain("queue item failed permanently"));
}

#[tokio::test]
async fn gateway_error_counts_as_an_attempt() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let item = queue(&h, &calendar.id, &h.create_post("u1", &["x"]).await.unwrap(), 0).await;
    h.gateway.push_error("HTTP 502").await;
    h.clock.set(at(5, 9, 0));

    assert_eq!(h.queue_processor.process_calendar_queue().await.retrying, 1);
    let current = h.queue.get_queue_item(&item.id, "u1").await.unwrap();
    assert_eq!(current.attempts, 1);
    assert!(current.error.unwrap().contains("HTTP 502"));

    // The script is empty now, so the retry succeeds.
    assert_eq!(h.queue_processor.process_calendar_queue().await.completed, 1);
    let done = h.queue.get_queue_item(&item.id, "u1").await.unwrap();
    assert_eq!(done.status, QueueStatus::Published);
    assert_eq!(done.error, None);
}

#[tokio::test]
async fn slow_gateway_times_out_and_retries() {
    let h = TestHarness::builder()
        .with_publish_timeout(Duration::from_millis(50))
        .build()
        .await
        .unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let item = queue(&h, &calendar.id, &h.create_post("u1", &["x"]).await.unwrap(), 0).await;
    h.gateway.push_stall(Duration::from_secs(5)).await;
    h.clock.set(at(5, 9, 0));

    assert_eq!(h.queue_processor.process_calendar_queue().await.retrying, 1);
    let current = h.queue.get_queue_item(&item.id, "u1").await.unwrap();
    assert!(current.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn already_published_post_skips_the_gateway() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let post = h.create_post("u1", &["x"]).await.unwrap();
    let item = queue(&h, &calendar.id, &post, 0).await;
    h.storage
        .set_post_status(&post.id, PostStatus::Published, at(5, 8, 30))
        .await
        .unwrap();
    h.clock.set(at(5, 9, 0));

    assert_eq!(h.queue_processor.process_calendar_queue().await.completed, 1);
    assert_eq!(h.gateway.call_count().await, 0);
    let item = h.queue.get_queue_item(&item.id, "u1").await.unwrap();
    assert_eq!(item.status, QueueStatus::Published);
}

#[tokio::test]
async fn missing_post_fails_the_item_for_good() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let item = h
        .queue
        .add_to_queue(QueueRequest::new("u1", &calendar.id, "gone", ContentType::Image))
        .await
        .unwrap();
    h.clock.set(at(5, 9, 0));

    assert_eq!(h.queue_processor.process_calendar_queue().await.failed, 1);
    let item = h.queue.get_queue_item(&item.id, "u1").await.unwrap();
    assert_eq!(item.status, QueueStatus::Failed);
    assert_eq!(item.error.as_deref(), Some("post not found: gone"));
    assert_eq!(h.gateway.call_count().await, 0);
}

#[tokio::test]
async fn higher_priority_drains_first() {
    let h = TestHarness::new().await.unwrap();
    let slots = vec![
        NewSlot::new(1, 9, 0),
        NewSlot::new(1, 9, 30),
        NewSlot::new(1, 10, 0),
    ];
    let calendar = h.create_calendar("u1", "UTC", slots).await.unwrap();
    let mut posts = Vec::new();
    for priority in [0, 5, 0] {
        let post = h.create_post("u1", &["x"]).await.unwrap();
        queue(&h, &calendar.id, &post, priority).await;
        posts.push(post.id);
    }
    h.clock.set(at(5, 10, 0));

    assert_eq!(h.queue_processor.process_calendar_queue().await.completed, 3);
    let order: Vec<String> = h.gateway.calls().await.into_iter().map(|p| p.id).collect();
    assert_eq!(order, vec![posts[1].clone(), posts[0].clone(), posts[2].clone()]);
}

#[tokio::test]
async fn item_platforms_override_the_post() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let post = h.create_post("u1", &["twitter"]).await.unwrap();
    let mut request = QueueRequest::new("u1", &calendar.id, &post.id, ContentType::Image);
    request.social_platforms = vec!["linkedin".into()];
    h.queue.add_to_queue(request).await.unwrap();
    h.clock.set(at(5, 9, 0));

    h.queue_processor.process_calendar_queue().await;
    let calls = h.gateway.calls().await;
    assert_eq!(calls[0].social_platforms, vec!["linkedin".to_string()]);
}

#[tokio::test]
async fn other_users_are_treated_as_not_found() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let post = h.create_post("u1", &["x"]).await.unwrap();
    let item = queue(&h, &calendar.id, &post, 0).await;

    assert!(matches!(
        h.queue.get_queue_item(&item.id, "u2").await,
        Err(CadenceError::QueueItemNotFound { .. })
    ));
    assert!(matches!(
        h.queue
            .add_to_queue(QueueRequest::new("u2", &calendar.id, &post.id, ContentType::Image))
            .await,
        Err(CadenceError::CalendarNotFound { .. })
    ));
    assert!(!h.queue.remove_from_queue(&item.id, "u2").await.unwrap());
    assert!(!h.queue.update_priority(&item.id, "u2", 9).await.unwrap());
    assert!(!h.queue.delete_queue_item(&item.id, "u2").await.unwrap());
}

#[tokio::test]
async fn reschedule_validates_time_and_slot() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let a = queue(&h, &calendar.id, &h.create_post("u1", &["x"]).await.unwrap(), 0).await;
    let b = queue(&h, &calendar.id, &h.create_post("u1", &["x"]).await.unwrap(), 0).await;

    assert!(matches!(
        h.queue.reschedule_item(&a.id, "u1", at(5, 7, 0)).await,
        Err(CadenceError::InvalidTime(_))
    ));
    assert!(matches!(
        h.queue.reschedule_item(&a.id, "u1", b.scheduled_publish_at).await,
        Err(CadenceError::SlotTaken { .. })
    ));
    let unchanged = h.queue.get_queue_item(&a.id, "u1").await.unwrap();
    assert_eq!(unchanged.scheduled_publish_at, at(5, 9, 0));

    let moved = h.queue.reschedule_item(&a.id, "u1", at(6, 15, 0)).await.unwrap();
    assert_eq!(moved.scheduled_publish_at, at(6, 15, 0));
    // Rescheduling onto its own time is not a conflict.
    h.queue.reschedule_item(&a.id, "u1", at(6, 15, 0)).await.unwrap();
}

#[tokio::test]
async fn cancelled_item_releases_its_slot() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let a = queue(&h, &calendar.id, &h.create_post("u1", &["x"]).await.unwrap(), 0).await;
    assert!(h.queue.remove_from_queue(&a.id, "u1").await.unwrap());
    let b = queue(&h, &calendar.id, &h.create_post("u1", &["x"]).await.unwrap(), 0).await;
    assert_eq!(b.scheduled_publish_at, a.scheduled_publish_at);
    assert!(matches!(
        h.queue.reschedule_item(&a.id, "u1", at(20, 9, 0)).await,
        Err(CadenceError::InvalidState { status: QueueStatus::Cancelled, .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_never_share_a_slot() {
    let h = TestHarness::new().await.unwrap();
    let daily: Vec<NewSlot> = (0..7).map(|day| NewSlot::new(day, 9, 0)).collect();
    let calendar = h.create_calendar("u1", "UTC", daily).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..6 {
        let post = h.create_post("u1", &["x"]).await.unwrap();
        let service = h.queue.clone();
        let calendar_id = calendar.id.clone();
        tasks.push(tokio::spawn(async move {
            service
                .add_to_queue(QueueRequest::new("u1", calendar_id, post.id, ContentType::Image))
                .await
        }));
    }

    let mut times = HashSet::new();
    for task in tasks {
        let item = task.await.unwrap().unwrap();
        assert!(times.insert(item.scheduled_publish_at), "slot assigned twice");
    }
    assert_eq!(times.len(), 6);
}

#[tokio::test]
async fn interrupted_items_go_back_through_the_failure_path() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let item = queue(&h, &calendar.id, &h.create_post("u1", &["x"]).await.unwrap(), 0).await;
    assert!(h.storage.claim_item(&item.id, at(5, 9, 0)).await.unwrap());

    assert_eq!(h.queue_processor.recover_interrupted().await.unwrap(), 1);
    let recovered = h.queue.get_queue_item(&item.id, "u1").await.unwrap();
    assert_eq!(recovered.status, QueueStatus::Queued);
    assert_eq!(recovered.attempts, 1);
    assert_eq!(recovered.error.as_deref(), Some(INTERRUPTED_REASON));
    assert_eq!(h.queue_processor.recover_interrupted().await.unwrap(), 0);
}

#[tokio::test]
async fn listings_join_posts_and_default_to_queued() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let a = queue(&h, &calendar.id, &h.create_post("u1", &["x"]).await.unwrap(), 0).await;
    let b = queue(&h, &calendar.id, &h.create_post("u1", &["x"]).await.unwrap(), 0).await;
    h.queue.remove_from_queue(&b.id, "u1").await.unwrap();

    let page = h
        .queue
        .get_calendar_queue(&calendar.id, "u1", &QueueFilter::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].item.id, a.id);
    assert_eq!(
        page.items[0].post.as_ref().map(|p| p.id.as_str()),
        Some(a.post_id.as_str())
    );

    let all = h
        .queue
        .get_user_queue_items("u1", &QueueFilter::default())
        .await
        .unwrap();
    assert_eq!(all.total, 2);

    let upcoming = h
        .queue
        .get_upcoming_queue_items(&calendar.id, "u1", None)
        .await
        .unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].item.scheduled_publish_at, at(5, 9, 0));
}

#[tokio::test]
async fn next_available_slot_previews_without_reserving() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let preview = h.queue.next_available_slot(&calendar.id, "u1").await.unwrap().unwrap();
    assert_eq!(preview.publish_at, at(5, 9, 0));
    let again = h.queue.next_available_slot(&calendar.id, "u1").await.unwrap().unwrap();
    assert_eq!(again, preview);
}

/// Post store whose status writes always fail.
struct LockedPostStatus(Arc<SqliteStorage>);

#[async_trait]
impl PostStore for LockedPostStatus {
    async fn get_post(&self, post_id: &str) -> Result<Option<Post>, CadenceError> {
        self.0.get_post(post_id).await
    }

    async fn set_post_status(
        &self,
        _post_id: &str,
        _status: PostStatus,
        _at: DateTime<Utc>,
    ) -> Result<bool, CadenceError> {
        Err(CadenceError::storage("database is locked"))
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post, CadenceError> {
        self.0.create_post(post).await
    }
}

#[tokio::test]
#[traced_test]
async fn post_status_error_after_publish_still_settles_the_item() {
    let h = TestHarness::new().await.unwrap();
    let calendar = h.create_calendar("u1", "UTC", monday_nine()).await.unwrap();
    let post = h.create_post("u1", &["x"]).await.unwrap();

    let service = Arc::new(QueueService::new(
        h.storage.clone(),
        h.storage.clone(),
        Arc::new(LockedPostStatus(h.storage.clone())),
        h.clock.clone(),
        QueueSettings::default(),
    ));
    let processor = QueueProcessor::new(
        QueueWork::new(service.clone(), h.gateway.clone(), Duration::from_secs(5)),
        h.clock.clone(),
        Duration::ZERO,
    );
    let item = service
        .add_to_queue(QueueRequest::new("u1", &calendar.id, &post.id, ContentType::Image))
        .await
        .unwrap();

    h.clock.set(at(5, 9, 1));
    let first = processor.process_calendar_queue().await;
    assert_eq!(first.completed, 1);
    assert_eq!(first.errors, 0);
    assert!(logs_contain("failed to mark post published"));

    let second = processor.process_calendar_queue().await;
    assert!(second.is_idle());
    assert_eq!(processor.recover_interrupted().await.unwrap(), 0);

    let item = service.get_queue_item(&item.id, "u1").await.unwrap();
    assert_eq!(item.status, QueueStatus::Published);
    assert_eq!(h.gateway.call_count().await, 1);
    let calendar = h.storage.get_calendar(&calendar.id).await.unwrap().unwrap();
    assert_eq!(calendar.publish_count, 1);
}

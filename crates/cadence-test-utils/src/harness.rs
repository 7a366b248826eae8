// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles every Cadence service over a temp SQLite database
//! with mock gateway and generation backends and a manual clock, so tests can
//! drive the queue and schedule processors tick by tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use cadence_config::model::StorageConfig;
use cadence_core::types::{
    Calendar, ContentType, NewCalendar, NewPost, NewSlot, Post, PostContent,
};
use cadence_core::{CadenceError, Clock, PostStore};
use cadence_queue::{CalendarService, QueueProcessor, QueueService, QueueSettings, QueueWork};
use cadence_schedule::{ActionExecutor, ScheduleProcessor, ScheduleService};
use cadence_storage::SqliteStorage;

use crate::clock::ManualClock;
use crate::mock_gateway::MockGateway;
use crate::mock_generation::MockGeneration;

/// Monday 2026-01-05 08:00 UTC.
pub fn default_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    start: DateTime<Utc>,
    queue: QueueSettings,
    publish_timeout: Duration,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            start: default_start(),
            queue: QueueSettings::default(),
            publish_timeout: Duration::from_secs(120),
        }
    }

    /// Set the manual clock's starting instant.
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn with_queue_settings(mut self, settings: QueueSettings) -> Self {
        self.queue = settings;
        self
    }

    /// Gateway timeout for both the queue and schedule publish paths.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, CadenceError> {
        let temp_dir = tempfile::TempDir::new().map_err(CadenceError::storage)?;
        let db_path = temp_dir.path().join("test.db");

        let clock = Arc::new(ManualClock::new(self.start));
        let dyn_clock: Arc<dyn Clock> = clock.clone();

        let storage = SqliteStorage::new(
            StorageConfig {
                database_path: db_path.to_string_lossy().into_owned(),
                wal_mode: true,
            },
            dyn_clock.clone(),
        );
        storage.initialize().await?;
        let storage = Arc::new(storage);

        let gateway = Arc::new(MockGateway::new());
        let generation = Arc::new(MockGeneration::new());

        let calendars = CalendarService::new(storage.clone());
        let queue = Arc::new(QueueService::new(
            storage.clone(),
            storage.clone(),
            storage.clone(),
            dyn_clock.clone(),
            self.queue,
        ));
        let queue_processor = QueueProcessor::new(
            QueueWork::new(queue.clone(), gateway.clone(), self.publish_timeout),
            dyn_clock.clone(),
            Duration::ZERO,
        );

        let schedules = Arc::new(ScheduleService::new(storage.clone(), dyn_clock.clone()));
        let executor = Arc::new(ActionExecutor::new(
            storage.clone(),
            generation.clone(),
            gateway.clone(),
            storage.clone(),
            dyn_clock.clone(),
            self.publish_timeout,
        ));
        let schedule_processor =
            ScheduleProcessor::new(schedules.clone(), executor, dyn_clock, Duration::ZERO);

        Ok(TestHarness {
            clock,
            storage,
            gateway,
            generation,
            calendars,
            queue,
            queue_processor,
            schedules,
            schedule_processor,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock collaborators and temp storage.
pub struct TestHarness {
    pub clock: Arc<ManualClock>,
    /// SQLite storage (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    pub gateway: Arc<MockGateway>,
    pub generation: Arc<MockGeneration>,
    pub calendars: CalendarService,
    pub queue: Arc<QueueService>,
    pub queue_processor: QueueProcessor,
    pub schedules: Arc<ScheduleService>,
    pub schedule_processor: ScheduleProcessor,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default settings.
    pub async fn new() -> Result<Self, CadenceError> {
        Self::builder().build().await
    }

    /// Stores a draft image post for `user_id` targeting `platforms`.
    pub async fn create_post(
        &self,
        user_id: &str,
        platforms: &[&str],
    ) -> Result<Post, CadenceError> {
        self.storage
            .create_post(&NewPost {
                user_id: user_id.to_string(),
                content_type: ContentType::Image,
                content: PostContent {
                    image_url: Some(format!("https://media.test/{}.png", uuid::Uuid::new_v4())),
                    prompt: "a lighthouse at dusk".to_string(),
                    ..Default::default()
                },
                nsfw: false,
                social_platforms: platforms.iter().map(|p| p.to_string()).collect(),
                mutation: None,
            })
            .await
    }

    /// Creates an active calendar for `user_id` with the given slots.
    pub async fn create_calendar(
        &self,
        user_id: &str,
        timezone: &str,
        slots: Vec<NewSlot>,
    ) -> Result<Calendar, CadenceError> {
        self.calendars
            .create_calendar(&NewCalendar {
                user_id: user_id.to_string(),
                name: "Main".to_string(),
                description: None,
                timezone: Some(timezone.to_string()),
                slots,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_builds_and_stores_posts() {
        let harness = TestHarness::new().await.unwrap();
        assert_eq!(harness.clock.now(), default_start());
        let post = harness.create_post("u1", &["twitter"]).await.unwrap();
        let loaded = harness.storage.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.social_platforms, vec!["twitter".to_string()]);
    }

    #[tokio::test]
    async fn empty_processors_are_idle() {
        let harness = TestHarness::new().await.unwrap();
        assert!(harness.queue_processor.process_calendar_queue().await.is_idle());
        let (single, recurring) = harness.schedule_processor.tick().await;
        assert!(single.is_idle() && recurring.is_idle());
    }
}

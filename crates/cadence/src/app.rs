// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service wiring shared by every subcommand.

use std::sync::Arc;

use tracing::info;

use cadence_config::CadenceConfig;
use cadence_core::{CadenceError, Clock, GenerationBackend, PublishGateway, SystemClock};
use cadence_queue::{QueueProcessor, QueueService, QueueSettings, QueueWork};
use cadence_schedule::{ActionExecutor, ScheduleProcessor, ScheduleService};
use cadence_storage::SqliteStorage;

use crate::generation::HttpGeneration;
use crate::late::LateGateway;

/// Both processors over one storage handle.
pub struct App {
    pub storage: Arc<SqliteStorage>,
    pub queue_processor: QueueProcessor,
    pub schedule_processor: ScheduleProcessor,
}

/// How many interrupted entities the startup pass returned to service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recovery {
    pub queue_items: usize,
    pub schedules: usize,
}

impl App {
    /// Production wiring: system clock, Late gateway, HTTP generation.
    pub async fn from_config(config: &CadenceConfig) -> Result<Self, CadenceError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let storage = open_storage(config, clock.clone()).await?;
        let gateway = Arc::new(LateGateway::from_config(
            &config.late,
            storage.clone(),
            config.queue.publish_timeout(),
        )?);
        let generation = Arc::new(HttpGeneration::from_config(&config.generation)?);
        Ok(Self::assemble(config, storage, clock, gateway, generation))
    }

    /// Wires the services around caller-supplied collaborators.
    pub fn assemble(
        config: &CadenceConfig,
        storage: Arc<SqliteStorage>,
        clock: Arc<dyn Clock>,
        gateway: Arc<dyn PublishGateway>,
        generation: Arc<dyn GenerationBackend>,
    ) -> Self {
        let queue = Arc::new(QueueService::new(
            storage.clone(),
            storage.clone(),
            storage.clone(),
            clock.clone(),
            QueueSettings::from(&config.queue),
        ));
        let queue_processor = QueueProcessor::new(
            QueueWork::new(queue, gateway.clone(), config.queue.publish_timeout()),
            clock.clone(),
            config.queue.pacing(),
        );

        let schedules = Arc::new(ScheduleService::new(storage.clone(), clock.clone()));
        let executor = Arc::new(ActionExecutor::new(
            storage.clone(),
            generation,
            gateway,
            storage.clone(),
            clock.clone(),
            config.queue.publish_timeout(),
        ));
        let schedule_processor = ScheduleProcessor::new(
            schedules,
            executor,
            clock,
            config.schedules.pacing(),
        );

        Self {
            storage,
            queue_processor,
            schedule_processor,
        }
    }

    /// Returns work left mid-flight by a crash to its normal path.
    pub async fn recover(&self) -> Result<Recovery, CadenceError> {
        let recovery = Recovery {
            queue_items: self.queue_processor.recover_interrupted().await?,
            schedules: self.schedule_processor.recover_interrupted().await?,
        };
        info!(
            queue_items = recovery.queue_items,
            schedules = recovery.schedules,
            "startup recovery finished"
        );
        Ok(recovery)
    }
}

/// Opens and migrates the configured database.
pub async fn open_storage(
    config: &CadenceConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<SqliteStorage>, CadenceError> {
    let storage = SqliteStorage::new(config.storage.clone(), clock);
    storage.initialize().await?;
    Ok(Arc::new(storage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    use cadence_core::types::{
        ContentType, NewCalendar, NewPost, NewSlot, PostContent, QueueRequest, QueueStatus,
    };
    use cadence_core::{CalendarRepository, PostStore, QueueRepository};
    use cadence_queue::CalendarService;
    use cadence_test_utils::{ManualClock, MockGateway, MockGeneration};

    use crate::serve::run_tick;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, hour, minute, 0).unwrap()
    }

    struct Fixture {
        app: App,
        calendars: CalendarService,
        queue: QueueService,
        clock: Arc<ManualClock>,
        gateway: Arc<MockGateway>,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = CadenceConfig::default();
        config.storage.database_path = dir.path().join("cadence.db").to_string_lossy().into_owned();
        config.queue.pacing_ms = 0;

        let clock = Arc::new(ManualClock::new(at(5, 8, 0)));
        let storage = open_storage(&config, clock.clone()).await.unwrap();
        let gateway = Arc::new(MockGateway::new());
        let calendars = CalendarService::new(storage.clone());
        let queue = QueueService::new(
            storage.clone(),
            storage.clone(),
            storage.clone(),
            clock.clone(),
            QueueSettings::from(&config.queue),
        );
        let app = App::assemble(
            &config,
            storage,
            clock.clone(),
            gateway.clone(),
            Arc::new(MockGeneration::new()),
        );
        Fixture {
            app,
            calendars,
            queue,
            clock,
            gateway,
            _dir: dir,
        }
    }

    async fn image_post(app: &App) -> String {
        app.storage
            .create_post(&NewPost {
                user_id: "u1".into(),
                content_type: ContentType::Image,
                content: PostContent {
                    image_url: Some("https://media.test/p.png".into()),
                    prompt: "tide pools".into(),
                    ..Default::default()
                },
                nsfw: false,
                social_platforms: vec!["twitter".into()],
                mutation: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn monday_slot_publishes_first_item_only() {
        let f = fixture().await;
        let calendar = f
            .calendars
            .create_calendar(&NewCalendar {
                user_id: "u1".into(),
                name: "Weekly".into(),
                slots: vec![NewSlot::new(1, 9, 0)],
                ..Default::default()
            })
            .await
            .unwrap();

        let p1 = image_post(&f.app).await;
        let p2 = image_post(&f.app).await;
        let first = f
            .queue
            .add_to_queue(QueueRequest::new("u1", &calendar.id, &p1, ContentType::Image))
            .await
            .unwrap();
        let second = f
            .queue
            .add_to_queue(QueueRequest::new("u1", &calendar.id, &p2, ContentType::Image))
            .await
            .unwrap();
        assert_eq!(first.scheduled_publish_at, at(5, 9, 0));
        assert_eq!(second.scheduled_publish_at, at(12, 9, 0));

        f.clock.set(at(5, 9, 1));
        let report = run_tick(&f.app).await;
        assert_eq!(report.queue.completed, 1);
        assert!(report.single_schedules.is_idle());

        let calls = f.gateway.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, p1);
        let second = f.queue.get_queue_item(&second.id, "u1").await.unwrap();
        assert_eq!(second.status, QueueStatus::Queued);
        let calendar = f.app.storage.get_calendar(&calendar.id).await.unwrap().unwrap();
        assert_eq!(calendar.publish_count, 1);
    }

    #[tokio::test]
    async fn recover_returns_processing_items_to_the_queue() {
        let f = fixture().await;
        let calendar = f
            .calendars
            .create_calendar(&NewCalendar {
                user_id: "u1".into(),
                name: "Weekly".into(),
                slots: vec![NewSlot::new(1, 9, 0)],
                ..Default::default()
            })
            .await
            .unwrap();
        let post = image_post(&f.app).await;
        let item = f
            .queue
            .add_to_queue(QueueRequest::new("u1", &calendar.id, &post, ContentType::Image))
            .await
            .unwrap();
        assert!(f.app.storage.claim_item(&item.id, at(5, 9, 0)).await.unwrap());

        let recovery = f.app.recover().await.unwrap();
        assert_eq!(recovery, Recovery { queue_items: 1, schedules: 0 });
        let item = f.queue.get_queue_item(&item.id, "u1").await.unwrap();
        assert_eq!(item.status, QueueStatus::Queued);
        assert_eq!(item.attempts, 1);
    }
}

// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the Cadence repository traits.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use cadence_config::model::StorageConfig;
use cadence_core::types::{
    Calendar, CalendarDeletion, CalendarUpdate, ExecutionRecord, FailureOutcome, NewCalendar,
    NewPost, NewPromptTemplate, NewQueueItem, NewSchedule, NewSlot, Page, Post, PostStatus,
    PromptTemplate, PublishProfile, QueueFilter, QueueItem, Schedule, ScheduleFilter,
    ScheduleStats, ScheduleStatus, Slot,
};
use cadence_core::{
    AccountDirectory, CadenceError, CalendarRepository, Clock, PostStore, QueueRepository,
    ScheduleRepository, TemplateStore,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage for every Cadence entity.
///
/// The database is opened lazily by [`SqliteStorage::initialize`]. Rows are
/// stamped with times from the injected [`Clock`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
    clock: Arc<dyn Clock>,
}

impl SqliteStorage {
    /// Creates the adapter without touching the filesystem.
    pub fn new(config: StorageConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            db: OnceCell::new(),
            clock,
        }
    }

    /// Opens an in-memory database with the full schema.
    pub async fn in_memory(clock: Arc<dyn Clock>) -> Result<Self, CadenceError> {
        let storage = Self::new(
            StorageConfig {
                database_path: ":memory:".into(),
                wal_mode: false,
            },
            clock,
        );
        let db = Database::open_in_memory().await?;
        storage
            .db
            .set(db)
            .map_err(|_| CadenceError::Internal("storage already initialized".into()))?;
        Ok(storage)
    }

    /// Opens the configured database and runs migrations. Idempotent.
    pub async fn initialize(&self) -> Result<(), CadenceError> {
        self.db
            .get_or_try_init(|| async {
                let db =
                    Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
                info!(path = %self.config.database_path, "storage initialized");
                Ok::<_, CadenceError>(db)
            })
            .await?;
        Ok(())
    }

    fn db(&self) -> Result<&Database, CadenceError> {
        self.db.get().ok_or_else(|| CadenceError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Round-trips a trivial statement.
    pub async fn health_check(&self) -> Result<(), CadenceError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoints the WAL. Safe to call when never initialized.
    pub async fn shutdown(&self) -> Result<(), CadenceError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("storage checkpointed on shutdown");
        }
        Ok(())
    }

    /// Replaces a user's publishing profile and connected accounts.
    pub async fn upsert_publish_profile(
        &self,
        profile: &PublishProfile,
    ) -> Result<(), CadenceError> {
        queries::accounts::upsert_publish_profile(self.db()?, profile).await
    }
}

#[async_trait]
impl CalendarRepository for SqliteStorage {
    async fn create_calendar(&self, input: &NewCalendar) -> Result<Calendar, CadenceError> {
        queries::calendars::create_calendar(self.db()?, input, self.now()).await
    }

    async fn get_calendar(&self, calendar_id: &str) -> Result<Option<Calendar>, CadenceError> {
        queries::calendars::get_calendar(self.db()?, calendar_id).await
    }

    async fn list_calendars(&self, user_id: &str) -> Result<Vec<Calendar>, CadenceError> {
        queries::calendars::list_calendars(self.db()?, user_id).await
    }

    async fn update_calendar(
        &self,
        calendar_id: &str,
        update: &CalendarUpdate,
    ) -> Result<Option<Calendar>, CadenceError> {
        queries::calendars::update_calendar(self.db()?, calendar_id, update, self.now()).await
    }

    async fn delete_calendar(&self, calendar_id: &str) -> Result<CalendarDeletion, CadenceError> {
        queries::calendars::delete_calendar(self.db()?, calendar_id, self.now()).await
    }

    async fn add_slot(&self, calendar_id: &str, slot: &NewSlot) -> Result<Slot, CadenceError> {
        queries::calendars::add_slot(self.db()?, calendar_id, slot, self.now()).await
    }

    async fn replace_slot(&self, calendar_id: &str, slot: &Slot) -> Result<bool, CadenceError> {
        queries::calendars::replace_slot(self.db()?, calendar_id, slot, self.now()).await
    }

    async fn remove_slot(&self, calendar_id: &str, slot_id: &str) -> Result<bool, CadenceError> {
        queries::calendars::remove_slot(self.db()?, calendar_id, slot_id, self.now()).await
    }

    async fn increment_publish_count(
        &self,
        calendar_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CadenceError> {
        queries::calendars::increment_publish_count(self.db()?, calendar_id, at).await
    }
}

#[async_trait]
impl QueueRepository for SqliteStorage {
    async fn insert_item(&self, item: &NewQueueItem) -> Result<QueueItem, CadenceError> {
        queries::queue::insert_item(self.db()?, item, self.now()).await
    }

    async fn get_item(&self, item_id: &str) -> Result<Option<QueueItem>, CadenceError> {
        queries::queue::get_item(self.db()?, item_id).await
    }

    async fn is_slot_taken(
        &self,
        calendar_id: &str,
        publish_at: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<bool, CadenceError> {
        queries::queue::is_slot_taken(self.db()?, calendar_id, publish_at, exclude_id).await
    }

    async fn ready_items(&self, now: DateTime<Utc>) -> Result<Vec<QueueItem>, CadenceError> {
        queries::queue::ready_items(self.db()?, now).await
    }

    async fn claim_item(&self, item_id: &str, at: DateTime<Utc>) -> Result<bool, CadenceError> {
        queries::queue::claim_item(self.db()?, item_id, at).await
    }

    async fn mark_published(
        &self,
        item_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, CadenceError> {
        queries::queue::mark_published(self.db()?, item_id, at).await
    }

    async fn record_failure(
        &self,
        item_id: &str,
        reason: &str,
        max_attempts: u32,
        at: DateTime<Utc>,
    ) -> Result<Option<FailureOutcome>, CadenceError> {
        queries::queue::record_failure(self.db()?, item_id, reason, max_attempts, at).await
    }

    async fn mark_failed_permanently(
        &self,
        item_id: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, CadenceError> {
        queries::queue::mark_failed_permanently(self.db()?, item_id, reason, at).await
    }

    async fn cancel_item(
        &self,
        item_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, CadenceError> {
        queries::queue::cancel_item(self.db()?, item_id, user_id, at).await
    }

    async fn delete_item(&self, item_id: &str, user_id: &str) -> Result<bool, CadenceError> {
        queries::queue::delete_item(self.db()?, item_id, user_id).await
    }

    async fn update_priority(
        &self,
        item_id: &str,
        user_id: &str,
        priority: i32,
        at: DateTime<Utc>,
    ) -> Result<bool, CadenceError> {
        queries::queue::update_priority(self.db()?, item_id, user_id, priority, at).await
    }

    async fn reschedule_item(
        &self,
        item_id: &str,
        publish_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool, CadenceError> {
        queries::queue::reschedule_item(self.db()?, item_id, publish_at, at).await
    }

    async fn list_items(
        &self,
        user_id: Option<&str>,
        filter: &QueueFilter,
    ) -> Result<Page<QueueItem>, CadenceError> {
        queries::queue::list_items(self.db()?, user_id, filter).await
    }

    async fn upcoming_items(
        &self,
        calendar_id: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<QueueItem>, CadenceError> {
        queries::queue::upcoming_items(self.db()?, calendar_id, now, limit).await
    }

    async fn processing_items(&self) -> Result<Vec<QueueItem>, CadenceError> {
        queries::queue::processing_items(self.db()?).await
    }
}

#[async_trait]
impl PostStore for SqliteStorage {
    async fn get_post(&self, post_id: &str) -> Result<Option<Post>, CadenceError> {
        queries::posts::get_post(self.db()?, post_id).await
    }

    async fn set_post_status(
        &self,
        post_id: &str,
        status: PostStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, CadenceError> {
        queries::posts::set_post_status(self.db()?, post_id, status, at).await
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post, CadenceError> {
        queries::posts::create_post(self.db()?, post, self.now()).await
    }
}

#[async_trait]
impl AccountDirectory for SqliteStorage {
    async fn publish_profile(
        &self,
        user_id: &str,
    ) -> Result<Option<PublishProfile>, CadenceError> {
        queries::accounts::publish_profile(self.db()?, user_id).await
    }
}

#[async_trait]
impl ScheduleRepository for SqliteStorage {
    async fn create_schedule(&self, schedule: &NewSchedule) -> Result<Schedule, CadenceError> {
        queries::schedules::create_schedule(self.db()?, schedule, self.now()).await
    }

    async fn get_schedule(&self, schedule_id: &str) -> Result<Option<Schedule>, CadenceError> {
        queries::schedules::get_schedule(self.db()?, schedule_id).await
    }

    async fn list_schedules(
        &self,
        user_id: &str,
        filter: &ScheduleFilter,
    ) -> Result<Page<Schedule>, CadenceError> {
        queries::schedules::list_schedules(self.db()?, user_id, filter).await
    }

    async fn schedule_stats(&self, user_id: &str) -> Result<ScheduleStats, CadenceError> {
        queries::schedules::schedule_stats(self.db()?, user_id).await
    }

    async fn due_single(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, CadenceError> {
        queries::schedules::due_single(self.db()?, now).await
    }

    async fn due_recurring(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, CadenceError> {
        queries::schedules::due_recurring(self.db()?, now).await
    }

    async fn transition(
        &self,
        schedule_id: &str,
        from: &[ScheduleStatus],
        to: ScheduleStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, CadenceError> {
        queries::schedules::transition(self.db()?, schedule_id, from, to, at).await
    }

    async fn record_execution(
        &self,
        schedule_id: &str,
        record: &ExecutionRecord,
    ) -> Result<bool, CadenceError> {
        queries::schedules::record_execution(self.db()?, schedule_id, record).await
    }

    async fn replace_schedule(&self, schedule: &Schedule) -> Result<bool, CadenceError> {
        queries::schedules::replace_schedule(self.db()?, schedule).await
    }

    async fn delete_schedule(&self, schedule_id: &str) -> Result<bool, CadenceError> {
        queries::schedules::delete_schedule(self.db()?, schedule_id).await
    }

    async fn running_schedules(&self) -> Result<Vec<Schedule>, CadenceError> {
        queries::schedules::running_schedules(self.db()?).await
    }
}

#[async_trait]
impl TemplateStore for SqliteStorage {
    async fn get_template(
        &self,
        template_id: &str,
    ) -> Result<Option<PromptTemplate>, CadenceError> {
        queries::templates::get_template(self.db()?, template_id).await
    }

    async fn create_template(
        &self,
        template: &NewPromptTemplate,
    ) -> Result<PromptTemplate, CadenceError> {
        queries::templates::create_template(self.db()?, template, self.now()).await
    }

    async fn record_template_use(
        &self,
        template_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CadenceError> {
        queries::templates::record_template_use(self.db()?, template_id, at).await
    }
}

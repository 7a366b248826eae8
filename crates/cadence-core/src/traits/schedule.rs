// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schedule and prompt template persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CadenceError;
use crate::types::{
    ExecutionRecord, NewPromptTemplate, NewSchedule, Page, PromptTemplate, Schedule,
    ScheduleFilter, ScheduleStats, ScheduleStatus,
};

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn create_schedule(&self, schedule: &NewSchedule) -> Result<Schedule, CadenceError>;

    async fn get_schedule(&self, schedule_id: &str) -> Result<Option<Schedule>, CadenceError>;

    async fn list_schedules(
        &self,
        user_id: &str,
        filter: &ScheduleFilter,
    ) -> Result<Page<Schedule>, CadenceError>;

    async fn schedule_stats(&self, user_id: &str) -> Result<ScheduleStats, CadenceError>;

    /// `pending` single schedules with `scheduledFor <= now`, oldest first.
    async fn due_single(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, CadenceError>;

    /// `active` recurring schedules with `nextExecutionAt <= now`, oldest first.
    async fn due_recurring(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, CadenceError>;

    /// Conditional status change: applies only when the current status is
    /// one of `from`.
    async fn transition(
        &self,
        schedule_id: &str,
        from: &[ScheduleStatus],
        to: ScheduleStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, CadenceError>;

    /// Writes an execution outcome and increments `executionCount`.
    async fn record_execution(
        &self,
        schedule_id: &str,
        record: &ExecutionRecord,
    ) -> Result<bool, CadenceError>;

    /// Overwrites the editable fields (description, action, timing,
    /// mutation flag, status).
    async fn replace_schedule(&self, schedule: &Schedule) -> Result<bool, CadenceError>;

    async fn delete_schedule(&self, schedule_id: &str) -> Result<bool, CadenceError>;

    /// Schedules left `running`, i.e. interrupted mid-execution.
    async fn running_schedules(&self) -> Result<Vec<Schedule>, CadenceError>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(
        &self,
        template_id: &str,
    ) -> Result<Option<PromptTemplate>, CadenceError>;

    async fn create_template(
        &self,
        template: &NewPromptTemplate,
    ) -> Result<PromptTemplate, CadenceError>;

    /// Increments `usageCount` and stamps `lastUsedAt`.
    async fn record_template_use(
        &self,
        template_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CadenceError>;
}

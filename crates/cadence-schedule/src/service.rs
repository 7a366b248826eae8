// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The schedule API: creation, editing and lifecycle of single and recurring
//! schedules, plus the mark-executed calls the processor records through.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use cadence_core::types::{
    ExecutionRecord, ExecutionResult, NewRecurringSchedule, NewSchedule, NewSingleSchedule, Page,
    Schedule, ScheduleAction, ScheduleFilter, ScheduleKind, ScheduleStats, ScheduleStatus,
    ScheduleTiming, ScheduleUpdate,
};
use cadence_core::{CadenceError, Clock, ScheduleRepository};

use crate::cron::CronSchedule;

/// Error recorded on schedules found `running` at startup.
pub const INTERRUPTED_REASON: &str = "interrupted before completion";

pub struct ScheduleService {
    schedules: Arc<dyn ScheduleRepository>,
    clock: Arc<dyn Clock>,
}

fn validate_action(action: &ScheduleAction) -> Result<(), CadenceError> {
    match action {
        ScheduleAction::GenerateImage(spec) | ScheduleAction::GenerateVideo(spec) => {
            if spec.prompt.trim().is_empty() && spec.template_id.is_none() {
                return Err(CadenceError::Validation(
                    "generation actions need a prompt or a template".into(),
                ));
            }
            Ok(())
        }
        ScheduleAction::PublishPost { post_id } => {
            if post_id.trim().is_empty() {
                return Err(CadenceError::Validation(
                    "publish actions need a post id".into(),
                ));
            }
            Ok(())
        }
    }
}

fn validate_max_executions(max_executions: Option<u32>) -> Result<(), CadenceError> {
    if max_executions == Some(0) {
        return Err(CadenceError::Validation(
            "maxExecutions must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Next run of a recurring schedule that has already run `executions` times,
/// or `None` when it is finished.
fn plan_next(
    cron: &CronSchedule,
    max_executions: Option<u32>,
    end_date: Option<DateTime<Utc>>,
    executions: u32,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if max_executions.is_some_and(|max| executions >= max) {
        return None;
    }
    cron.next_after(now)
        .filter(|next| end_date.is_none_or(|end| *next <= end))
}

fn no_upcoming_run(expression: &str) -> CadenceError {
    CadenceError::Validation(format!(
        "cron expression {expression:?} has no run before the end date"
    ))
}

impl ScheduleService {
    pub fn new(schedules: Arc<dyn ScheduleRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { schedules, clock }
    }

    pub(crate) fn repository(&self) -> &dyn ScheduleRepository {
        self.schedules.as_ref()
    }

    pub async fn create_single_schedule(
        &self,
        input: NewSingleSchedule,
    ) -> Result<Schedule, CadenceError> {
        validate_action(&input.action)?;
        if input.scheduled_for <= self.clock.now() {
            return Err(CadenceError::InvalidTime(
                "scheduledFor must be in the future".into(),
            ));
        }

        let schedule = self
            .schedules
            .create_schedule(&NewSchedule {
                user_id: input.user_id,
                description: input.description,
                action: input.action,
                timing: ScheduleTiming::Single {
                    scheduled_for: input.scheduled_for,
                },
                mutation_enabled: input.mutation_enabled,
                status: ScheduleStatus::Pending,
            })
            .await?;
        info!(
            schedule_id = %schedule.id,
            user_id = %schedule.user_id,
            scheduled_for = %input.scheduled_for,
            "single schedule created"
        );
        Ok(schedule)
    }

    pub async fn create_recurring_schedule(
        &self,
        input: NewRecurringSchedule,
    ) -> Result<Schedule, CadenceError> {
        validate_action(&input.action)?;
        validate_max_executions(input.max_executions)?;
        let cron = CronSchedule::parse(&input.cron_expression)?;
        let next = plan_next(
            &cron,
            input.max_executions,
            input.end_date,
            0,
            self.clock.now(),
        )
        .ok_or_else(|| no_upcoming_run(cron.expression()))?;

        let schedule = self
            .schedules
            .create_schedule(&NewSchedule {
                user_id: input.user_id,
                description: input.description,
                action: input.action,
                timing: ScheduleTiming::Recurring {
                    cron_expression: cron.expression().to_string(),
                    max_executions: input.max_executions,
                    end_date: input.end_date,
                    next_execution_at: Some(next),
                },
                mutation_enabled: input.mutation_enabled,
                status: ScheduleStatus::Active,
            })
            .await?;
        info!(
            schedule_id = %schedule.id,
            user_id = %schedule.user_id,
            cron = cron.expression(),
            next_execution_at = %next,
            "recurring schedule created"
        );
        Ok(schedule)
    }

    /// A schedule the user owns. Someone else's schedule is reported as not found.
    pub async fn get_schedule(
        &self,
        schedule_id: &str,
        user_id: &str,
    ) -> Result<Schedule, CadenceError> {
        match self.schedules.get_schedule(schedule_id).await? {
            Some(schedule) if schedule.user_id == user_id => Ok(schedule),
            _ => Err(CadenceError::ScheduleNotFound {
                id: schedule_id.to_string(),
            }),
        }
    }

    pub async fn get_user_schedules(
        &self,
        user_id: &str,
        filter: &ScheduleFilter,
    ) -> Result<Page<Schedule>, CadenceError> {
        self.schedules.list_schedules(user_id, filter).await
    }

    pub async fn get_user_schedule_stats(
        &self,
        user_id: &str,
    ) -> Result<ScheduleStats, CadenceError> {
        self.schedules.schedule_stats(user_id).await
    }

    /// Applies a partial update. Timing fields must match the schedule's kind;
    /// a recurring schedule's next run is recomputed when its timing changes.
    pub async fn update_schedule(
        &self,
        schedule_id: &str,
        user_id: &str,
        update: &ScheduleUpdate,
    ) -> Result<Schedule, CadenceError> {
        let mut schedule = self.get_schedule(schedule_id, user_id).await?;
        if schedule.status.is_terminal() || schedule.status == ScheduleStatus::Running {
            return Err(CadenceError::InvalidScheduleState {
                id: schedule.id,
                status: schedule.status,
                operation: "update",
            });
        }
        let now = self.clock.now();

        if let Some(action) = &update.action {
            validate_action(action)?;
            schedule.action = action.clone();
        }
        if let Some(description) = &update.description {
            schedule.description = Some(description.clone());
        }
        if let Some(enabled) = update.mutation_enabled {
            schedule.mutation_enabled = enabled;
        }

        match &mut schedule.timing {
            ScheduleTiming::Single { scheduled_for } => {
                if update.cron_expression.is_some()
                    || update.max_executions.is_some()
                    || update.end_date.is_some()
                {
                    return Err(CadenceError::Validation(
                        "recurring fields cannot be set on a single schedule".into(),
                    ));
                }
                if let Some(at) = update.scheduled_for {
                    if at <= now {
                        return Err(CadenceError::InvalidTime(
                            "scheduledFor must be in the future".into(),
                        ));
                    }
                    *scheduled_for = at;
                }
            }
            ScheduleTiming::Recurring {
                cron_expression,
                max_executions,
                end_date,
                next_execution_at,
            } => {
                if update.scheduled_for.is_some() {
                    return Err(CadenceError::Validation(
                        "scheduledFor cannot be set on a recurring schedule".into(),
                    ));
                }
                if update.touches_timing() {
                    validate_max_executions(update.max_executions)?;
                    let expression = update
                        .cron_expression
                        .as_deref()
                        .unwrap_or(cron_expression.as_str());
                    let cron = CronSchedule::parse(expression)?;
                    let max = update.max_executions.or(*max_executions);
                    let end = update.end_date.or(*end_date);
                    let next = plan_next(&cron, max, end, schedule.execution_count, now)
                        .ok_or_else(|| no_upcoming_run(cron.expression()))?;
                    *cron_expression = cron.expression().to_string();
                    *max_executions = max;
                    *end_date = end;
                    *next_execution_at = Some(next);
                }
            }
        }

        schedule.updated_at = now;
        if !self.schedules.replace_schedule(&schedule).await? {
            return Err(CadenceError::ScheduleNotFound {
                id: schedule.id,
            });
        }
        info!(schedule_id = %schedule.id, "schedule updated");
        Ok(schedule)
    }

    async fn transition_owned(
        &self,
        schedule: &Schedule,
        from: &[ScheduleStatus],
        to: ScheduleStatus,
        operation: &'static str,
    ) -> Result<Schedule, CadenceError> {
        let now = self.clock.now();
        if !from.contains(&schedule.status)
            || !self
                .schedules
                .transition(&schedule.id, from, to, now)
                .await?
        {
            return Err(CadenceError::InvalidScheduleState {
                id: schedule.id.clone(),
                status: schedule.status,
                operation,
            });
        }
        info!(
            schedule_id = %schedule.id,
            from = %schedule.status,
            to = %to,
            operation,
            "schedule status changed"
        );
        self.get_schedule(&schedule.id, &schedule.user_id).await
    }

    /// Pauses an active recurring schedule.
    pub async fn pause_schedule(
        &self,
        schedule_id: &str,
        user_id: &str,
    ) -> Result<Schedule, CadenceError> {
        let schedule = self.get_schedule(schedule_id, user_id).await?;
        let from: &[ScheduleStatus] = match schedule.kind() {
            ScheduleKind::Recurring => &[ScheduleStatus::Active],
            ScheduleKind::Single => &[],
        };
        self.transition_owned(&schedule, from, ScheduleStatus::Paused, "pause")
            .await
    }

    /// Resumes a paused recurring schedule. The next run is computed from now,
    /// so runs missed while paused are not replayed.
    pub async fn resume_schedule(
        &self,
        schedule_id: &str,
        user_id: &str,
    ) -> Result<Schedule, CadenceError> {
        let mut schedule = self.get_schedule(schedule_id, user_id).await?;
        let invalid = |schedule: &Schedule| CadenceError::InvalidScheduleState {
            id: schedule.id.clone(),
            status: schedule.status,
            operation: "resume",
        };
        if schedule.status != ScheduleStatus::Paused {
            return Err(invalid(&schedule));
        }
        let now = self.clock.now();
        let next = match &schedule.timing {
            ScheduleTiming::Recurring {
                cron_expression,
                max_executions,
                end_date,
                ..
            } => {
                let cron = CronSchedule::parse(cron_expression)?;
                plan_next(&cron, *max_executions, *end_date, schedule.execution_count, now)
                    .ok_or_else(|| {
                        CadenceError::Validation("schedule has no remaining runs".into())
                    })?
            }
            ScheduleTiming::Single { .. } => return Err(invalid(&schedule)),
        };
        if let ScheduleTiming::Recurring {
            next_execution_at, ..
        } = &mut schedule.timing
        {
            *next_execution_at = Some(next);
        }

        schedule.status = ScheduleStatus::Active;
        schedule.updated_at = now;
        if !self.schedules.replace_schedule(&schedule).await? {
            return Err(CadenceError::ScheduleNotFound { id: schedule.id });
        }
        info!(schedule_id = %schedule.id, next_execution_at = %next, "schedule resumed");
        Ok(schedule)
    }

    pub async fn cancel_schedule(
        &self,
        schedule_id: &str,
        user_id: &str,
    ) -> Result<Schedule, CadenceError> {
        let schedule = self.get_schedule(schedule_id, user_id).await?;
        let from: &[ScheduleStatus] = match schedule.kind() {
            ScheduleKind::Single => &[ScheduleStatus::Pending],
            ScheduleKind::Recurring => &[ScheduleStatus::Active, ScheduleStatus::Paused],
        };
        self.transition_owned(&schedule, from, ScheduleStatus::Cancelled, "cancel")
            .await
    }

    /// Deletes a schedule that is not mid-execution.
    pub async fn delete_schedule(
        &self,
        schedule_id: &str,
        user_id: &str,
    ) -> Result<bool, CadenceError> {
        let schedule = self.get_schedule(schedule_id, user_id).await?;
        if schedule.status == ScheduleStatus::Running {
            return Err(CadenceError::InvalidScheduleState {
                id: schedule.id,
                status: schedule.status,
                operation: "delete",
            });
        }
        let deleted = self.schedules.delete_schedule(&schedule.id).await?;
        if deleted {
            info!(schedule_id = %schedule.id, "schedule deleted");
        }
        Ok(deleted)
    }

    /// Claims a due schedule for execution. `false` when another worker got
    /// there first or the schedule changed since it was loaded.
    pub(crate) async fn claim(&self, schedule: &Schedule) -> Result<bool, CadenceError> {
        let from = match schedule.kind() {
            ScheduleKind::Single => ScheduleStatus::Pending,
            ScheduleKind::Recurring => ScheduleStatus::Active,
        };
        self.schedules
            .transition(&schedule.id, &[from], ScheduleStatus::Running, self.clock.now())
            .await
    }

    /// Finalizes a single schedule: `completed` on success, `failed` otherwise.
    pub async fn mark_single_executed(
        &self,
        schedule: &Schedule,
        result: ExecutionResult,
    ) -> Result<ScheduleStatus, CadenceError> {
        let status = if result.success {
            ScheduleStatus::Completed
        } else {
            ScheduleStatus::Failed
        };
        let record = ExecutionRecord {
            status,
            executed_at: self.clock.now(),
            result,
            next_execution_at: None,
        };
        self.write(schedule, &record).await?;
        Ok(status)
    }

    /// Records a recurring run and plans the next one whatever the outcome.
    /// The schedule completes when it reached `maxExecutions`, its next run
    /// would pass `endDate`, or the expression never fires again.
    pub async fn mark_recurring_executed(
        &self,
        schedule: &Schedule,
        result: ExecutionResult,
    ) -> Result<ScheduleStatus, CadenceError> {
        let now = self.clock.now();
        let next = match &schedule.timing {
            ScheduleTiming::Recurring {
                cron_expression,
                max_executions,
                end_date,
                ..
            } => match CronSchedule::parse(cron_expression) {
                Ok(cron) => plan_next(
                    &cron,
                    *max_executions,
                    *end_date,
                    schedule.execution_count.saturating_add(1),
                    now,
                ),
                Err(e) => {
                    warn!(
                        schedule_id = %schedule.id,
                        error = %e,
                        "stored cron expression no longer parses"
                    );
                    None
                }
            },
            ScheduleTiming::Single { .. } => None,
        };
        let status = if next.is_some() {
            ScheduleStatus::Active
        } else {
            ScheduleStatus::Completed
        };
        let record = ExecutionRecord {
            status,
            executed_at: now,
            result,
            next_execution_at: next,
        };
        self.write(schedule, &record).await?;
        if status == ScheduleStatus::Completed {
            info!(schedule_id = %schedule.id, "recurring schedule completed");
        }
        Ok(status)
    }

    /// Records by kind.
    pub async fn mark_executed(
        &self,
        schedule: &Schedule,
        result: ExecutionResult,
    ) -> Result<ScheduleStatus, CadenceError> {
        match schedule.kind() {
            ScheduleKind::Single => self.mark_single_executed(schedule, result).await,
            ScheduleKind::Recurring => self.mark_recurring_executed(schedule, result).await,
        }
    }

    async fn write(
        &self,
        schedule: &Schedule,
        record: &ExecutionRecord,
    ) -> Result<(), CadenceError> {
        if !self.schedules.record_execution(&schedule.id, record).await? {
            return Err(CadenceError::ScheduleNotFound {
                id: schedule.id.clone(),
            });
        }
        Ok(())
    }

    /// Finalizes schedules left `running` by a previous process as failed
    /// executions. Returns how many were recovered.
    pub async fn recover_interrupted(&self) -> Result<usize, CadenceError> {
        let running = self.schedules.running_schedules().await?;
        for schedule in &running {
            let status = self
                .mark_executed(schedule, ExecutionResult::failure(INTERRUPTED_REASON))
                .await?;
            warn!(schedule_id = %schedule.id, %status, "recovered interrupted schedule");
        }
        Ok(running.len())
    }
}

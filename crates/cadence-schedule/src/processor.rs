// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schedule processor.
//!
//! Two due sets are drained per tick: pending single schedules whose time has
//! come and active recurring schedules whose next run has passed. The sets run
//! concurrently with each other and sequentially within each set. Every
//! schedule is claimed as `running` before its action executes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use cadence_core::types::{ExecutionResult, Schedule, ScheduleKind};
use cadence_core::{CadenceError, Clock, DuePoller, DueWork, ItemOutcome, TickSummary};

use crate::actions::ActionExecutor;
use crate::service::ScheduleService;

/// Execution of one due schedule of a given kind.
pub struct ScheduleWork {
    kind: ScheduleKind,
    service: Arc<ScheduleService>,
    executor: Arc<ActionExecutor>,
}

impl ScheduleWork {
    pub fn new(
        kind: ScheduleKind,
        service: Arc<ScheduleService>,
        executor: Arc<ActionExecutor>,
    ) -> Self {
        Self {
            kind,
            service,
            executor,
        }
    }
}

#[async_trait]
impl DueWork for ScheduleWork {
    type Item = Schedule;

    fn label(&self) -> &'static str {
        match self.kind {
            ScheduleKind::Single => "single_schedules",
            ScheduleKind::Recurring => "recurring_schedules",
        }
    }

    fn item_id(&self, item: &Schedule) -> String {
        item.id.clone()
    }

    async fn fetch_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, CadenceError> {
        let repository = self.service.repository();
        match self.kind {
            ScheduleKind::Single => repository.due_single(now).await,
            ScheduleKind::Recurring => repository.due_recurring(now).await,
        }
    }

    async fn execute(&self, schedule: Schedule) -> Result<ItemOutcome, CadenceError> {
        if !self.service.claim(&schedule).await? {
            return Ok(ItemOutcome::Skipped);
        }

        let result = match self.executor.execute(&schedule).await {
            Ok(data) => ExecutionResult::success(data),
            Err(e) => {
                warn!(
                    schedule_id = %schedule.id,
                    action = %schedule.action.action_type(),
                    error = %e,
                    "schedule action failed"
                );
                ExecutionResult::failure(e.to_string())
            }
        };
        let success = result.success;
        self.service.mark_executed(&schedule, result).await?;

        Ok(if success {
            ItemOutcome::Completed
        } else {
            ItemOutcome::Failed
        })
    }
}

pub struct ScheduleProcessor {
    single: DuePoller<ScheduleWork>,
    recurring: DuePoller<ScheduleWork>,
    service: Arc<ScheduleService>,
}

impl ScheduleProcessor {
    pub fn new(
        service: Arc<ScheduleService>,
        executor: Arc<ActionExecutor>,
        clock: Arc<dyn Clock>,
        pacing: Duration,
    ) -> Self {
        let work = |kind| ScheduleWork::new(kind, service.clone(), executor.clone());
        Self {
            single: DuePoller::new(work(ScheduleKind::Single), clock.clone(), pacing),
            recurring: DuePoller::new(work(ScheduleKind::Recurring), clock, pacing),
            service,
        }
    }

    pub async fn process_pending_schedules(&self) -> TickSummary {
        self.single.tick().await
    }

    pub async fn process_recurring_schedules(&self) -> TickSummary {
        self.recurring.tick().await
    }

    /// Drains both due sets concurrently.
    pub async fn tick(&self) -> (TickSummary, TickSummary) {
        tokio::join!(
            self.process_pending_schedules(),
            self.process_recurring_schedules()
        )
    }

    /// Finalizes schedules interrupted mid-execution by a previous process.
    pub async fn recover_interrupted(&self) -> Result<usize, CadenceError> {
        let recovered = self.service.recover_interrupted().await?;
        if recovered > 0 {
            info!(recovered, "finalized interrupted schedules");
        }
        Ok(recovered)
    }
}

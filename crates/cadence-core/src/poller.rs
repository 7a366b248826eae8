// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic due-item poller shared by the queue and schedule processors.
//!
//! A [`DuePoller`] runs one "tick": it asks its [`DueWork`] for everything due
//! now, executes the items one at a time with a fixed pacing delay between
//! them, and returns a [`TickSummary`]. A tick never fails. Fetch errors end
//! the tick early and per-item errors are counted, both are logged.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::CadenceError;
use crate::traits::Clock;

/// How a single item ended up after [`DueWork::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    /// The work was done.
    Completed,
    /// Nothing needed doing (already published, lost a claim race).
    Skipped,
    /// Failed but will be picked up again by a later tick.
    Retrying,
    /// Failed for good.
    Failed,
}

/// A family of work items that become due over time.
#[async_trait]
pub trait DueWork: Send + Sync {
    type Item: Send + Sync;

    /// Short name used in log lines, e.g. `"queue"`.
    fn label(&self) -> &'static str;

    /// Identifier of an item for logging.
    fn item_id(&self, item: &Self::Item) -> String;

    /// Everything due at or before `now`, in execution order.
    async fn fetch_due(&self, now: DateTime<Utc>) -> Result<Vec<Self::Item>, CadenceError>;

    /// Executes one item and records its outcome. An `Err` means the outcome
    /// itself could not be recorded.
    async fn execute(&self, item: Self::Item) -> Result<ItemOutcome, CadenceError>;
}

/// Counts for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub due: usize,
    pub completed: usize,
    pub skipped: usize,
    pub retrying: usize,
    pub failed: usize,
    /// Items whose execution returned an error.
    pub errors: usize,
    /// The due set could not be loaded.
    pub fetch_failed: bool,
}

impl TickSummary {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Completed => self.completed += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Retrying => self.retrying += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.due == 0 && !self.fetch_failed
    }
}

impl fmt::Display for TickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "due={} completed={} skipped={} retrying={} failed={} errors={}",
            self.due, self.completed, self.skipped, self.retrying, self.failed, self.errors
        )
    }
}

/// Drains a [`DueWork`] one item at a time.
pub struct DuePoller<W> {
    work: W,
    clock: Arc<dyn Clock>,
    pacing: Duration,
}

impl<W: DueWork> DuePoller<W> {
    pub fn new(work: W, clock: Arc<dyn Clock>, pacing: Duration) -> Self {
        Self {
            work,
            clock,
            pacing,
        }
    }

    pub fn work(&self) -> &W {
        &self.work
    }

    /// Runs one drain pass over the items due now.
    pub async fn tick(&self) -> TickSummary {
        let label = self.work.label();
        let mut summary = TickSummary::default();

        let now = self.clock.now();
        let items = match self.work.fetch_due(now).await {
            Ok(items) => items,
            Err(e) => {
                error!(poller = label, error = %e, "failed to load due items");
                summary.fetch_failed = true;
                return summary;
            }
        };

        summary.due = items.len();
        if items.is_empty() {
            debug!(poller = label, "nothing due");
            return summary;
        }
        info!(poller = label, due = summary.due, "processing due items");

        let total = items.len();
        for (index, item) in items.into_iter().enumerate() {
            let item_id = self.work.item_id(&item);
            match self.work.execute(item).await {
                Ok(outcome) => {
                    debug!(poller = label, item_id = %item_id, ?outcome, "item processed");
                    summary.record(outcome);
                }
                Err(e) => {
                    warn!(poller = label, item_id = %item_id, error = %e, "item execution failed");
                    summary.errors += 1;
                }
            }

            if index + 1 < total && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        info!(poller = label, %summary, "tick finished");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// Scripted work: each item names the outcome it should produce.
    struct Scripted {
        items: Vec<(&'static str, Result<ItemOutcome, &'static str>)>,
        fail_fetch: bool,
        seen: Mutex<Vec<&'static str>>,
    }

    impl Scripted {
        fn new(items: Vec<(&'static str, Result<ItemOutcome, &'static str>)>) -> Self {
            Self {
                items,
                fail_fetch: false,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DueWork for Scripted {
        type Item = (&'static str, Result<ItemOutcome, &'static str>);

        fn label(&self) -> &'static str {
            "test"
        }

        fn item_id(&self, item: &Self::Item) -> String {
            item.0.to_string()
        }

        async fn fetch_due(&self, _now: DateTime<Utc>) -> Result<Vec<Self::Item>, CadenceError> {
            if self.fail_fetch {
                return Err(CadenceError::storage("database is locked"));
            }
            Ok(self.items.clone())
        }

        async fn execute(&self, item: Self::Item) -> Result<ItemOutcome, CadenceError> {
            self.seen.lock().unwrap().push(item.0);
            item.1.map_err(|e| CadenceError::Internal(e.into()))
        }
    }

    fn poller(work: Scripted, pacing: Duration) -> DuePoller<Scripted> {
        DuePoller::new(work, Arc::new(FixedClock(Utc::now())), pacing)
    }

    #[tokio::test]
    async fn empty_due_set_is_a_no_op() {
        let p = poller(Scripted::new(vec![]), Duration::ZERO);
        let summary = p.tick().await;
        assert!(summary.is_idle());
        assert_eq!(summary, TickSummary::default());
    }

    #[tokio::test]
    async fn outcomes_are_tallied_and_errors_do_not_stop_the_tick() {
        let p = poller(
            Scripted::new(vec![
                ("a", Ok(ItemOutcome::Completed)),
                ("b", Err("boom")),
                ("c", Ok(ItemOutcome::Retrying)),
                ("d", Ok(ItemOutcome::Skipped)),
                ("e", Ok(ItemOutcome::Failed)),
            ]),
            Duration::ZERO,
        );
        let summary = p.tick().await;
        assert_eq!(summary.due, 5);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.retrying, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(*p.work().seen.lock().unwrap(), vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn fetch_failure_is_reported_not_raised() {
        let mut work = Scripted::new(vec![("a", Ok(ItemOutcome::Completed))]);
        work.fail_fetch = true;
        let p = poller(work, Duration::ZERO);
        let summary = p.tick().await;
        assert!(summary.fetch_failed);
        assert!(p.work().seen.lock().unwrap().is_empty());
        assert!(logs_contain("failed to load due items"));
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_applies_between_items_only() {
        let p = poller(
            Scripted::new(vec![
                ("a", Ok(ItemOutcome::Completed)),
                ("b", Ok(ItemOutcome::Completed)),
                ("c", Ok(ItemOutcome::Completed)),
            ]),
            Duration::from_secs(1),
        );
        let start = tokio::time::Instant::now();
        p.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn summary_display_lists_counts() {
        let summary = TickSummary {
            due: 2,
            completed: 1,
            failed: 1,
            ..Default::default()
        };
        assert_eq!(
            summary.to_string(),
            "due=2 completed=1 skipped=0 retrying=0 failed=1 errors=0"
        );
    }
}

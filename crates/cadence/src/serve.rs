// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `cadence serve` and `cadence tick`.
//!
//! `serve` runs startup recovery, then drives the queue and schedule
//! processors from two independent interval loops until a shutdown signal.
//! Each loop awaits its tick to completion before waiting for the next one,
//! so a slow tick delays that loop and never overlaps itself.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cadence_config::CadenceConfig;
use cadence_core::{CadenceError, TickSummary};

use crate::app::App;
use crate::shutdown;

/// Summaries of one pass over every processor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub queue: TickSummary,
    pub single_schedules: TickSummary,
    pub recurring_schedules: TickSummary,
}

/// Runs the `cadence serve` command.
pub async fn run_serve(config: CadenceConfig) -> Result<(), CadenceError> {
    info!(service = %config.service.name, "starting cadence serve");

    let app = Arc::new(App::from_config(&config).await?);
    app.recover().await?;

    let cancel = shutdown::install_signal_handler();
    let mut tasks = Vec::new();

    if config.queue.enabled {
        let app = app.clone();
        tasks.push(tokio::spawn(run_loop(
            "queue",
            config.queue.tick_interval(),
            cancel.clone(),
            move || {
                let app = app.clone();
                async move {
                    app.queue_processor.process_calendar_queue().await;
                }
            },
        )));
        info!(interval_secs = config.queue.tick_interval_secs, "queue processor enabled");
    } else {
        info!("queue processor disabled");
    }

    if config.schedules.enabled {
        let app = app.clone();
        tasks.push(tokio::spawn(run_loop(
            "schedules",
            config.schedules.tick_interval(),
            cancel.clone(),
            move || {
                let app = app.clone();
                async move {
                    app.schedule_processor.tick().await;
                }
            },
        )));
        info!(
            interval_secs = config.schedules.tick_interval_secs,
            "schedule processor enabled"
        );
    } else {
        info!("schedule processor disabled");
    }

    if tasks.is_empty() {
        warn!("no processors enabled, waiting for shutdown");
        cancel.cancelled().await;
    }
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "processor loop ended abnormally");
        }
    }

    app.storage.shutdown().await?;
    info!("cadence serve shutdown complete");
    Ok(())
}

/// Calls `tick` every `period` until `cancel` fires. The first tick runs
/// immediately.
async fn run_loop<F, Fut>(label: &'static str, period: Duration, cancel: CancellationToken, tick: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                debug!(processor = label, "tick");
                tick().await;
            }
            _ = cancel.cancelled() => {
                info!(processor = label, "processor loop shutting down");
                break;
            }
        }
    }
}

/// One pass over every processor, for external timers.
pub async fn run_tick(app: &App) -> TickReport {
    let (queue, (single_schedules, recurring_schedules)) = tokio::join!(
        app.queue_processor.process_calendar_queue(),
        app.schedule_processor.tick(),
    );
    TickReport {
        queue,
        single_schedules,
        recurring_schedules,
    }
}

/// Initialize the tracing subscriber with an env filter.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cadence={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn loop_ticks_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let handle = {
            let count = count.clone();
            tokio::spawn(run_loop("test", Duration::from_secs(60), cancel.clone(), move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            }))
        };

        tokio::time::sleep(Duration::from_secs(150)).await;
        cancel.cancel();
        handle.await.unwrap();
        // Immediate tick plus the ones at 60 s and 120 s.
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tick_does_not_overlap_itself() {
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let handle = {
            let running = running.clone();
            let max_seen = max_seen.clone();
            tokio::spawn(run_loop("slow", Duration::from_secs(1), cancel.clone(), move || {
                let running = running.clone();
                let max_seen = max_seen.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                }
            }))
        };

        tokio::time::sleep(Duration::from_secs(20)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}

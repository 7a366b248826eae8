// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schedules for the Cadence publish engine.
//!
//! A schedule runs an action (generate an image, generate a video, publish an
//! existing post) either once at a fixed time or repeatedly on a cron
//! expression. [`ScheduleService`] manages schedules, [`ActionExecutor`] runs
//! their actions, and [`ScheduleProcessor`] drains whatever is due.

pub mod actions;
pub mod cron;
pub mod mutation;
pub mod processor;
pub mod service;

pub use actions::ActionExecutor;
pub use cron::{CronSchedule, next_run};
pub use mutation::{MutatedPrompt, TemplateExpander, generate_variations, mutate_prompt};
pub use processor::{ScheduleProcessor, ScheduleWork};
pub use service::ScheduleService;

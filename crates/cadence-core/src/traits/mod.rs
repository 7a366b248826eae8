// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions for the Cadence publish engine.
//!
//! Storage, publishing and generation all sit behind these traits and use
//! `#[async_trait]` so services can hold them as `Arc<dyn Trait>`.

pub mod calendar;
pub mod clock;
pub mod generation;
pub mod post;
pub mod queue;
pub mod schedule;

pub use calendar::CalendarRepository;
pub use clock::{Clock, SystemClock};
pub use generation::GenerationBackend;
pub use post::{AccountDirectory, PostStore, PublishGateway};
pub use queue::QueueRepository;
pub use schedule::{ScheduleRepository, TemplateStore};

// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Cadence publish engine.
//!
//! This crate provides the error type, the domain types, the collaborator
//! traits that storage, publishing and generation backends implement, and the
//! generic due-item poller that drives both the publish queue and schedules.

pub mod error;
pub mod poller;
pub mod traits;
pub mod types;

pub use error::CadenceError;
pub use poller::{DuePoller, DueWork, ItemOutcome, TickSummary};

pub use traits::{
    AccountDirectory, CalendarRepository, Clock, GenerationBackend, PostStore, PublishGateway,
    QueueRepository, ScheduleRepository, SystemClock, TemplateStore,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_collaborator_traits_are_exported() {
        fn _assert_object_safe(
            _: &dyn CalendarRepository,
            _: &dyn QueueRepository,
            _: &dyn PostStore,
            _: &dyn PublishGateway,
            _: &dyn ScheduleRepository,
            _: &dyn TemplateStore,
            _: &dyn GenerationBackend,
            _: &dyn AccountDirectory,
            _: &dyn Clock,
        ) {
        }
    }

    #[test]
    fn system_clock_moves_forward() {
        let a = SystemClock.now();
        let b = SystemClock.now();
        assert!(b >= a);
    }
}

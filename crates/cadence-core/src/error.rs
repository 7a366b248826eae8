// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Cadence publish engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{QueueStatus, ScheduleStatus};

/// The primary error type used across all Cadence collaborator traits and services.
#[derive(Debug, Error)]
pub enum CadenceError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The referenced calendar does not exist or is not owned by the caller.
    #[error("calendar not found: {calendar_id}")]
    CalendarNotFound { calendar_id: String },

    /// The calendar exists but is switched off.
    #[error("calendar is not active: {calendar_id}")]
    CalendarInactive { calendar_id: String },

    /// The calendar has no enabled slots to allocate from.
    #[error("calendar {calendar_id} has no enabled slots")]
    NoEnabledSlots { calendar_id: String },

    /// Every slot inside the search horizon is already taken.
    #[error("no available slots in the next {horizon_days} days for calendar {calendar_id}")]
    NoAvailableSlot {
        calendar_id: String,
        horizon_days: u32,
    },

    /// Another active queue item already holds this publish time.
    #[error("the selected time slot {publish_at} is already taken on calendar {calendar_id}")]
    SlotTaken {
        calendar_id: String,
        publish_at: DateTime<Utc>,
    },

    /// The queue item does not exist or is not owned by the caller.
    #[error("queue item not found or not authorized: {id}")]
    QueueItemNotFound { id: String },

    /// The operation is not permitted from the entity's current status.
    #[error("cannot {operation} item {id} while it is {status}")]
    InvalidState {
        id: String,
        status: QueueStatus,
        operation: &'static str,
    },

    /// The schedule operation is not permitted from its current status.
    #[error("cannot {operation} schedule {id} while it is {status}")]
    InvalidScheduleState {
        id: String,
        status: ScheduleStatus,
        operation: &'static str,
    },

    /// The requested time is unusable (in the past, outside a window).
    #[error("invalid time: {0}")]
    InvalidTime(String),

    /// The schedule does not exist or is not owned by the caller.
    #[error("schedule not found or not authorized: {id}")]
    ScheduleNotFound { id: String },

    /// The prompt template does not exist.
    #[error("template not found: {id}")]
    TemplateNotFound { id: String },

    /// Caller input failed a semantic check.
    #[error("validation error: {0}")]
    Validation(String),

    /// Publishing gateway errors (network failure, API rejection).
    #[error("publish error: {message}")]
    Publish {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Media generation backend errors.
    #[error("generation error: {message}")]
    Generation {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CadenceError {
    /// Wraps any storage-layer error.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Returns `true` for errors caused by the caller's request rather than
    /// the system. The API layer surfaces these as 4xx responses.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::CalendarNotFound { .. }
                | Self::CalendarInactive { .. }
                | Self::NoEnabledSlots { .. }
                | Self::NoAvailableSlot { .. }
                | Self::SlotTaken { .. }
                | Self::QueueItemNotFound { .. }
                | Self::InvalidState { .. }
                | Self::InvalidScheduleState { .. }
                | Self::InvalidTime(_)
                | Self::ScheduleNotFound { .. }
                | Self::TemplateNotFound { .. }
                | Self::Validation(_)
        )
    }
}

// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Calendar slot allocation and the publish queue.
//!
//! [`slot`] finds the next free weekly slot on a calendar, [`CalendarService`]
//! manages calendars and their slots, [`QueueService`] is the queue API, and
//! [`QueueProcessor`] drains due items through a publish gateway.

pub mod calendar;
pub mod processor;
pub mod service;
pub mod slot;

pub use calendar::CalendarService;
pub use processor::{QueueProcessor, QueueWork};
pub use service::{QueueService, QueueSettings};
pub use slot::{SlotOccupancy, SlotSearch, find_next_slot, parse_timezone};

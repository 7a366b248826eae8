// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across collaborator traits and the Cadence services.

pub mod calendar;
pub mod post;
pub mod queue;
pub mod schedule;

pub use calendar::*;
pub use post::*;
pub use queue::*;
pub use schedule::*;

use serde::{Deserialize, Serialize};

/// One page of a listing, with the totals needed to render pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Build a page, deriving `total_pages` from `total` and `limit`.
    pub fn new(items: Vec<T>, page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit))
        };
        Self {
            items,
            page,
            limit,
            total,
            total_pages,
        }
    }

    /// Same pagination over different items, e.g. after enriching each row.
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            page: self.page,
            limit: self.limit,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

/// 1-based page request shared by every paged listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 20;

    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_rounds_total_pages_up() {
        let page: Page<u8> = Page::new(vec![], 1, 20, 41);
        assert_eq!(page.total_pages, 3);
        let empty: Page<u8> = Page::new(vec![], 1, 20, 0);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn page_request_offset_is_zero_based() {
        assert_eq!(PageRequest::new(1, 20).offset(), 0);
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
        // Page 0 is clamped to the first page.
        assert_eq!(PageRequest::new(0, 10).offset(), 0);
    }
}

// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cron next-run computation. Expressions have five fields and are evaluated
//! in UTC.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use croner::Cron;

use cadence_core::CadenceError;

/// A parsed five-field cron expression.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    cron: Cron,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, CadenceError> {
        let expression = expression.trim();
        let fields = expression.split_whitespace().count();
        if fields != 5 {
            return Err(CadenceError::Validation(format!(
                "cron expression must have 5 fields, got {fields}: {expression:?}"
            )));
        }
        let cron = Cron::from_str(expression).map_err(|e| {
            CadenceError::Validation(format!("invalid cron expression {expression:?}: {e}"))
        })?;
        Ok(Self {
            expression: expression.to_string(),
            cron,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `after`, `None` when the expression
    /// never fires again.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron.find_next_occurrence(&after, false).ok()
    }
}

/// Parses `expression` and returns its first occurrence after `after`.
pub fn next_run(
    expression: &str,
    after: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, CadenceError> {
    Ok(CronSchedule::parse(expression)?.next_after(after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn weekly_expression_finds_next_monday() {
        // 2026-10-14 is a Wednesday.
        let next = next_run("0 9 * * 1", utc(2026, 10, 14, 12, 0)).unwrap();
        assert_eq!(next, Some(utc(2026, 10, 19, 9, 0)));
    }

    #[test]
    fn next_run_is_strictly_after() {
        let at = utc(2026, 10, 19, 9, 0);
        let next = next_run("0 9 * * 1", at).unwrap();
        assert_eq!(next, Some(utc(2026, 10, 26, 9, 0)));
    }

    #[test]
    fn every_fifteen_minutes() {
        let next = next_run("*/15 * * * *", utc(2026, 1, 1, 10, 7)).unwrap();
        assert_eq!(next, Some(utc(2026, 1, 1, 10, 15)));
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        assert!(matches!(
            CronSchedule::parse("0 0 9 * * 1"),
            Err(CadenceError::Validation(_))
        ));
        assert!(matches!(
            CronSchedule::parse("0 9 *"),
            Err(CadenceError::Validation(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = CronSchedule::parse("61 9 * * 1").unwrap_err();
        assert!(err.to_string().contains("invalid cron expression"));
    }

    #[test]
    fn expression_is_trimmed() {
        let cron = CronSchedule::parse("  0 9 * * 1 ").unwrap();
        assert_eq!(cron.expression(), "0 9 * * 1");
    }
}

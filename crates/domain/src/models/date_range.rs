//! Half-open calendar date ranges.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DutyError;

/// A half-open range of calendar dates, `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting reversed bounds and spans over `max_days`.
    pub fn new(from: NaiveDate, to: NaiveDate, max_days: i64) -> Result<Self, DutyError> {
        shared::validation::validate_date_range(from, to, max_days).map_err(|e| {
            DutyError::Validation(
                e.message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid date range".to_string()),
            )
        })?;
        Ok(Self { from, to })
    }

    /// Range starting at `from` and covering `days` days.
    pub fn starting_at(from: NaiveDate, days: i64) -> Self {
        Self {
            from,
            to: from + chrono::Duration::days(days.max(0)),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date < self.to
    }

    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }

    pub fn num_days(&self) -> i64 {
        (self.to - self.from).num_days().max(0)
    }

    /// Iterate over every date in the range in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d < to)
    }
}

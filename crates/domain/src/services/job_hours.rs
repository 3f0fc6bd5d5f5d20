//! Collaborator interface for confirmed job-assignment hours.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::DutyError;
use crate::models::DateRange;

/// Supplies a family's confirmed job-assignment hours for a date range.
#[async_trait::async_trait]
pub trait JobHoursSource: Send + Sync {
    async fn confirmed_job_hours(&self, family_id: Uuid, range: DateRange)
        -> Result<f64, DutyError>;
}

/// Fixed per-family totals, for development and testing.
#[derive(Debug, Clone, Default)]
pub struct FixedJobHours {
    hours: HashMap<Uuid, f64>,
}

impl FixedJobHours {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_family(mut self, family_id: Uuid, hours: f64) -> Self {
        self.hours.insert(family_id, hours);
        self
    }
}

#[async_trait::async_trait]
impl JobHoursSource for FixedJobHours {
    async fn confirmed_job_hours(
        &self,
        family_id: Uuid,
        _range: DateRange,
    ) -> Result<f64, DutyError> {
        Ok(self.hours.get(&family_id).copied().unwrap_or(0.0))
    }
}

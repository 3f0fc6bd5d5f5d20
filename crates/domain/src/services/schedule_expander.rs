//! Expansion of duty templates into dated slots.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::store::DutyStore;
use crate::error::DutyError;
use crate::models::{DateRange, DutyConfig, DutySchedule, DutySettings, NewSlot, Slot};

/// Dates a schedule produces within `range`.
///
/// One-off schedules always yield their single date, whatever the range.
pub fn occurrence_dates(schedule: &DutySchedule, range: &DateRange) -> Vec<NaiveDate> {
    match schedule {
        DutySchedule::Weekly(weekday) => range.days().filter(|d| d.weekday() == *weekday).collect(),
        DutySchedule::OneOff(date) => vec![*date],
    }
}

/// Outcome of a generation pass over all active templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub configs: usize,
    pub slots_created: usize,
    pub failed: usize,
}

pub struct ScheduleExpander {
    store: Arc<dyn DutyStore>,
    clock: Arc<dyn Clock>,
    settings: DutySettings,
}

impl ScheduleExpander {
    pub fn new(store: Arc<dyn DutyStore>, clock: Arc<dyn Clock>, settings: DutySettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// Materialize the slots of one template over `range`.
    ///
    /// Returns only the slots created by this call; dates that already have a
    /// slot for the template are skipped. Inactive templates produce nothing.
    pub async fn generate_slots(
        &self,
        config_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<Slot>, DutyError> {
        let range = DateRange::new(range.from, range.to, self.settings.max_range_days)?;
        let config = self
            .store
            .find_config(config_id)
            .await?
            .ok_or_else(|| DutyError::NotFound("Duty config not found".to_string()))?;

        self.expand(&config, &range).await
    }

    /// Expand every active template from today over `horizon_days`.
    pub async fn generate_upcoming(&self, horizon_days: i64) -> Result<GenerationReport, DutyError> {
        let today = self
            .clock
            .now()
            .with_timezone(&self.settings.offset())
            .date_naive();
        let range = DateRange::starting_at(today, horizon_days);

        let configs = self.store.list_active_configs().await?;
        let mut report = GenerationReport {
            configs: configs.len(),
            ..Default::default()
        };

        for config in &configs {
            // Past one-off dates are not worth materializing on a sweep.
            if let DutySchedule::OneOff(date) = config.schedule {
                if date < today {
                    continue;
                }
            }

            match self.expand(config, &range).await {
                Ok(created) => report.slots_created += created.len(),
                Err(e) => {
                    warn!(config_id = %config.id, error = %e, "Slot generation failed, skipping");
                    report.failed += 1;
                }
            }
        }

        if report.slots_created > 0 || report.failed > 0 {
            info!(
                configs = report.configs,
                slots_created = report.slots_created,
                failed = report.failed,
                horizon_days = horizon_days,
                "Slot generation finished"
            );
        }

        Ok(report)
    }

    async fn expand(&self, config: &DutyConfig, range: &DateRange) -> Result<Vec<Slot>, DutyError> {
        if !config.active {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let mut created = Vec::new();
        for date in occurrence_dates(&config.schedule, range) {
            let slot = NewSlot::from_config(config, date, shared::crypto::generate_check_in_token());
            if let Some(slot) = self.store.insert_slot_if_absent(slot, now).await? {
                created.push(slot);
            }
        }

        if !created.is_empty() {
            info!(
                config_id = %config.id,
                count = created.len(),
                from = %range.from,
                to = %range.to,
                "Slots generated"
            );
        }

        Ok(created)
    }
}

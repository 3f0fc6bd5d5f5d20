//! Rolling slot generation.

use std::sync::Arc;

use domain::services::ScheduleExpander;
use metrics::counter;
use tracing::info;

use super::scheduler::{Job, JobFrequency};

/// Keeps slots materialized for every active template over a rolling horizon.
pub struct SlotGenerationJob {
    expander: Arc<ScheduleExpander>,
    horizon_days: i64,
    interval_minutes: u64,
}

impl SlotGenerationJob {
    pub fn new(expander: Arc<ScheduleExpander>, horizon_days: i64, interval_minutes: u64) -> Self {
        Self {
            expander,
            horizon_days,
            interval_minutes,
        }
    }
}

#[async_trait::async_trait]
impl Job for SlotGenerationJob {
    fn name(&self) -> &'static str {
        "slot_generation"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.interval_minutes)
    }

    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<(), String> {
        let report = self
            .expander
            .generate_upcoming(self.horizon_days)
            .await
            .map_err(|e| format!("Failed to generate slots: {}", e))?;

        counter!("duty_slots_generated_total").increment(report.slots_created as u64);

        if report.slots_created > 0 {
            info!(
                configs = report.configs,
                slots_created = report.slots_created,
                horizon_days = self.horizon_days,
                "Generated upcoming slots"
            );
        }

        if report.failed > 0 {
            return Err(format!(
                "{} of {} templates failed to expand",
                report.failed, report.configs
            ));
        }

        Ok(())
    }
}

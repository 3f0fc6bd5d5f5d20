//! Time-driven slot completion.

use std::sync::Arc;

use domain::services::SlotLifecycleManager;
use metrics::counter;

use super::scheduler::{Job, JobFrequency};

/// Completes slots whose end has passed, flagging no-shows when enabled.
pub struct SlotReconciliationJob {
    lifecycle: Arc<SlotLifecycleManager>,
    interval_minutes: u64,
}

impl SlotReconciliationJob {
    pub fn new(lifecycle: Arc<SlotLifecycleManager>, interval_minutes: u64) -> Self {
        Self {
            lifecycle,
            interval_minutes,
        }
    }
}

#[async_trait::async_trait]
impl Job for SlotReconciliationJob {
    fn name(&self) -> &'static str {
        "slot_reconciliation"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.interval_minutes)
    }

    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<(), String> {
        let report = self
            .lifecycle
            .reconcile()
            .await
            .map_err(|e| format!("Failed to reconcile slots: {}", e))?;

        counter!("duty_slots_completed_total").increment(report.completed as u64);
        counter!("duty_no_shows_flagged_total").increment(report.no_shows_flagged);

        if report.failed > 0 {
            return Err(format!(
                "{} of {} ended slots could not be reconciled",
                report.failed, report.examined
            ));
        }

        Ok(())
    }
}

//! Outbox drain.

use std::sync::Arc;

use domain::services::OutboxDispatcher;
use metrics::counter;

use super::scheduler::{Job, JobFrequency};

/// Hands pending duty events to the publisher and marks them delivered.
pub struct EventDispatchJob {
    dispatcher: Arc<OutboxDispatcher>,
    batch_size: usize,
    interval_secs: u64,
}

impl EventDispatchJob {
    pub fn new(dispatcher: Arc<OutboxDispatcher>, batch_size: usize, interval_secs: u64) -> Self {
        Self {
            dispatcher,
            batch_size,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for EventDispatchJob {
    fn name(&self) -> &'static str {
        "event_dispatch"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    // Drains whatever a previous run left behind.
    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<(), String> {
        let report = self
            .dispatcher
            .dispatch_pending(self.batch_size)
            .await
            .map_err(|e| format!("Failed to read pending duty events: {}", e))?;

        counter!("duty_events_delivered_total").increment(report.delivered as u64);

        if report.deferred > 0 || report.failed > 0 {
            return Err(format!(
                "{} duty events deferred and {} unmarked of {} pending",
                report.deferred, report.failed, report.examined
            ));
        }

        Ok(())
    }
}

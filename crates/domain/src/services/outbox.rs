//! Delivery of outbox events to the configured publisher.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::clock::Clock;
use super::events::DutyEventPublisher;
use super::store::DutyStore;
use crate::error::DutyError;

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub examined: usize,
    pub delivered: usize,
    /// Left pending because the publisher refused an earlier event.
    pub deferred: usize,
    /// Published but not marked; these are published again next pass.
    pub failed: usize,
}

pub struct OutboxDispatcher {
    store: Arc<dyn DutyStore>,
    publisher: Arc<dyn DutyEventPublisher>,
    clock: Arc<dyn Clock>,
}

impl OutboxDispatcher {
    pub fn new(
        store: Arc<dyn DutyStore>,
        publisher: Arc<dyn DutyEventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
        }
    }

    /// Publish up to `batch_size` pending events, oldest first.
    ///
    /// An event is marked delivered only after the publisher accepted it.
    /// The first refusal ends the pass so ordering is kept; the refused
    /// event and everything after it stay pending.
    pub async fn dispatch_pending(&self, batch_size: usize) -> Result<DispatchReport, DutyError> {
        let pending = self.store.list_pending_events(batch_size).await?;
        let mut report = DispatchReport {
            examined: pending.len(),
            ..Default::default()
        };

        for (index, entry) in pending.iter().enumerate() {
            if let Err(e) = self.publisher.publish(&entry.event) {
                warn!(
                    event_id = %entry.id,
                    event_type = entry.event.event_type(),
                    aggregate_id = %entry.event.aggregate_id(),
                    error = %e,
                    "Publisher refused duty event, leaving it pending"
                );
                report.deferred = pending.len() - index;
                break;
            }

            match self
                .store
                .mark_event_delivered(entry.id, self.clock.now())
                .await
            {
                Ok(_) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        event_id = %entry.id,
                        event_type = entry.event.event_type(),
                        error = %e,
                        "Failed to mark duty event delivered"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.examined > 0 {
            info!(
                delivered = report.delivered,
                deferred = report.deferred,
                failed = report.failed,
                "Duty event dispatch completed"
            );
        }
        Ok(report)
    }
}

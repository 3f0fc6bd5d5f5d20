//! Slot status machine and the periodic reconciliation pass.
//!
//! ```text
//! open ──(registered == max)──▶ full ──(registered < max)──▶ open
//! open | full ──(admin cancel)──▶ cancelled   (terminal)
//! open | full ──(end passed)────▶ completed   (terminal)
//! ```

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::store::DutyStore;
use crate::error::DutyError;
use crate::models::{DateRange, DutySettings, Slot, SlotOccupancy, SlotStatus};

/// Pure status transitions, shared by every store implementation.
pub struct SlotLifecycle;

impl SlotLifecycle {
    /// Status after a registration brings the count to `registered`.
    pub fn after_claim(current: SlotStatus, registered: i64, max_participants: i32) -> SlotStatus {
        if current == SlotStatus::Open && registered >= max_participants as i64 {
            SlotStatus::Full
        } else {
            current
        }
    }

    /// Status after a cancellation drops the count to `registered`.
    pub fn after_release(current: SlotStatus, registered: i64, max_participants: i32) -> SlotStatus {
        if current == SlotStatus::Full && registered < max_participants as i64 {
            SlotStatus::Open
        } else {
            current
        }
    }

    /// Only open or full slots can be cancelled or completed.
    pub fn can_close(current: SlotStatus) -> bool {
        matches!(current, SlotStatus::Open | SlotStatus::Full)
    }

    /// Reject mutations of registrations on a terminal slot.
    pub fn ensure_not_terminal(status: SlotStatus, action: &str) -> Result<(), DutyError> {
        if status.is_terminal() {
            Err(DutyError::State(format!("Cannot {} on a {} slot", action, status)))
        } else {
            Ok(())
        }
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub examined: usize,
    pub completed: usize,
    pub no_shows_flagged: u64,
    pub failed: usize,
}

/// Owns administrative and time-driven slot transitions plus the read
/// surfaces used by the feed and banners.
pub struct SlotLifecycleManager {
    store: Arc<dyn DutyStore>,
    clock: Arc<dyn Clock>,
    settings: DutySettings,
}

impl SlotLifecycleManager {
    pub fn new(store: Arc<dyn DutyStore>, clock: Arc<dyn Clock>, settings: DutySettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    pub async fn get_slot(&self, slot_id: Uuid) -> Result<Slot, DutyError> {
        self.store
            .find_slot(slot_id)
            .await?
            .ok_or_else(|| DutyError::NotFound("Slot not found".to_string()))
    }

    /// Cancel a slot. Terminal: blocks registration, check-in and check-out.
    pub async fn cancel_slot(
        &self,
        slot_id: Uuid,
        admin_id: Uuid,
        reason: Option<&str>,
    ) -> Result<Slot, DutyError> {
        let now = self.clock.now();
        match self.store.cancel_slot(slot_id, admin_id, reason, now).await? {
            Some(slot) => {
                info!(
                    slot_id = %slot_id,
                    admin_id = %admin_id,
                    slot_date = %slot.slot_date,
                    "Slot cancelled"
                );
                Ok(slot)
            }
            None => {
                let slot = self.get_slot(slot_id).await?;
                Err(DutyError::State(format!(
                    "Slot is already {} and cannot be cancelled",
                    slot.status
                )))
            }
        }
    }

    /// Issue a fresh check-in credential, invalidating the previous one.
    pub async fn rotate_check_in_token(&self, slot_id: Uuid) -> Result<Slot, DutyError> {
        let token = shared::crypto::generate_check_in_token();
        let now = self.clock.now();
        match self.store.set_slot_token(slot_id, &token, now).await? {
            Some(slot) => {
                info!(
                    slot_id = %slot_id,
                    token_fingerprint = %shared::crypto::token_fingerprint(&slot.qr_token),
                    "Check-in token rotated"
                );
                Ok(slot)
            }
            None => {
                let slot = self.get_slot(slot_id).await?;
                Err(DutyError::State(format!(
                    "Cannot issue a check-in token for a {} slot",
                    slot.status
                )))
            }
        }
    }

    /// Complete every open/full slot whose end has passed.
    ///
    /// Safe to re-run; completed slots are skipped. No-shows are flagged
    /// before completion, so a slot whose flagging fails stays open/full and
    /// is picked up again by the next pass. A failure on one slot is logged
    /// and counted, and the pass moves on.
    pub async fn reconcile(&self) -> Result<ReconciliationReport, DutyError> {
        let now = self.clock.now();
        let offset = self.settings.offset();
        let today = now.with_timezone(&offset).date_naive();

        let candidates = self.store.list_unfinished_slots(today).await?;
        let mut report = ReconciliationReport::default();

        for slot in candidates.iter().filter(|s| s.has_ended(now, offset)) {
            report.examined += 1;

            if self.settings.auto_flag_no_shows {
                match self.store.flag_no_shows(slot.id, now).await {
                    Ok(flagged) => report.no_shows_flagged += flagged,
                    Err(e) => {
                        warn!(slot_id = %slot.id, error = %e, "Failed to flag no-shows, skipping");
                        report.failed += 1;
                        continue;
                    }
                }
            }

            match self.store.complete_slot(slot.id, now).await {
                Ok(Some(_)) => report.completed += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(slot_id = %slot.id, error = %e, "Failed to complete slot, skipping");
                    report.failed += 1;
                }
            }
        }

        if report.completed > 0 || report.failed > 0 {
            info!(
                examined = report.examined,
                completed = report.completed,
                no_shows_flagged = report.no_shows_flagged,
                failed = report.failed,
                "Slot reconciliation finished"
            );
        }

        Ok(report)
    }

    /// Slots in `range` still short of their minimum staffing.
    pub async fn slots_needing_participants(
        &self,
        range: DateRange,
    ) -> Result<Vec<SlotOccupancy>, DutyError> {
        let range = DateRange::new(range.from, range.to, self.settings.max_range_days)?;
        let slots = self.store.list_slots(range, None).await?;
        Ok(slots.into_iter().filter(|o| o.needs_participants()).collect())
    }

    /// Open or full slots that have not ended yet, soonest first.
    pub async fn upcoming_slots(
        &self,
        section_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<SlotOccupancy>, DutyError> {
        let now = self.clock.now();
        let offset = self.settings.offset();
        let today = now.with_timezone(&offset).date_naive();
        let range = DateRange {
            from: today,
            to: today + Duration::days(self.settings.max_range_days),
        };

        let slots = self.store.list_slots(range, section_id).await?;
        Ok(slots
            .into_iter()
            .filter(|o| !o.slot.status.is_terminal() && !o.slot.has_ended(now, offset))
            .take(limit)
            .collect())
    }
}

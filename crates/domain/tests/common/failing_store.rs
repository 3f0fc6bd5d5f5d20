//! `DutyStore` that fails or races chosen calls and delegates the rest to
//! `InMemoryDutyStore`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{
    DateRange, DutyConfig, FamilyAttendanceRecord, NewDutyConfig, NewRegistration, NewSlot,
    Registration, Slot, SlotOccupancy, Transferee,
};
use domain::services::{ClaimOutcome, DutyStore, InMemoryDutyStore, OutboxEvent, ReleaseOutcome};
use domain::DutyError;
use uuid::Uuid;

#[derive(Default)]
pub struct FailingStore {
    pub inner: Arc<InMemoryDutyStore>,
    slot_inserts: Mutex<HashSet<Uuid>>,
    completions: Mutex<HashSet<Uuid>>,
    flags_once: Mutex<HashSet<Uuid>>,
    cancel_before_check_in: Mutex<HashSet<Uuid>>,
}

fn outage() -> DutyError {
    DutyError::Storage("Database error: connection reset".to_string())
}

impl FailingStore {
    pub fn new(inner: Arc<InMemoryDutyStore>) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    /// Every slot insert for the template fails.
    pub fn fail_slot_inserts_for(&self, config_id: Uuid) {
        self.slot_inserts.lock().unwrap().insert(config_id);
    }

    /// Every completion of the slot fails.
    pub fn fail_completion_of(&self, slot_id: Uuid) {
        self.completions.lock().unwrap().insert(slot_id);
    }

    /// The next no-show flagging on the slot fails; later ones succeed.
    pub fn fail_flagging_once(&self, slot_id: Uuid) {
        self.flags_once.lock().unwrap().insert(slot_id);
    }

    /// Cancel the slot right before the next check-in write on it lands.
    pub fn cancel_before_check_in(&self, slot_id: Uuid) {
        self.cancel_before_check_in.lock().unwrap().insert(slot_id);
    }
}

#[async_trait::async_trait]
impl DutyStore for FailingStore {
    async fn insert_config(
        &self,
        config: NewDutyConfig,
        now: DateTime<Utc>,
    ) -> Result<DutyConfig, DutyError> {
        self.inner.insert_config(config, now).await
    }

    async fn find_config(&self, id: Uuid) -> Result<Option<DutyConfig>, DutyError> {
        self.inner.find_config(id).await
    }

    async fn update_config(
        &self,
        config: &DutyConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyConfig>, DutyError> {
        self.inner.update_config(config, now).await
    }

    async fn set_config_active(
        &self,
        id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyConfig>, DutyError> {
        self.inner.set_config_active(id, active, now).await
    }

    async fn list_active_configs(&self) -> Result<Vec<DutyConfig>, DutyError> {
        self.inner.list_active_configs().await
    }

    async fn insert_slot_if_absent(
        &self,
        slot: NewSlot,
        now: DateTime<Utc>,
    ) -> Result<Option<Slot>, DutyError> {
        if self.slot_inserts.lock().unwrap().contains(&slot.config_id) {
            return Err(outage());
        }
        self.inner.insert_slot_if_absent(slot, now).await
    }

    async fn find_slot(&self, id: Uuid) -> Result<Option<Slot>, DutyError> {
        self.inner.find_slot(id).await
    }

    async fn list_slots(
        &self,
        range: DateRange,
        section_id: Option<Uuid>,
    ) -> Result<Vec<SlotOccupancy>, DutyError> {
        self.inner.list_slots(range, section_id).await
    }

    async fn list_unfinished_slots(&self, through: NaiveDate) -> Result<Vec<Slot>, DutyError> {
        self.inner.list_unfinished_slots(through).await
    }

    async fn cancel_slot(
        &self,
        id: Uuid,
        cancelled_by: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Slot>, DutyError> {
        self.inner.cancel_slot(id, cancelled_by, reason, now).await
    }

    async fn complete_slot(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Slot>, DutyError> {
        if self.completions.lock().unwrap().contains(&id) {
            return Err(outage());
        }
        self.inner.complete_slot(id, now).await
    }

    async fn set_slot_token(
        &self,
        id: Uuid,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Slot>, DutyError> {
        self.inner.set_slot_token(id, token, now).await
    }

    async fn claim_spot(
        &self,
        registration: NewRegistration,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, DutyError> {
        self.inner.claim_spot(registration, now).await
    }

    async fn release_spot(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, DutyError> {
        self.inner.release_spot(slot_id, user_id, now).await
    }

    async fn find_registration(&self, id: Uuid) -> Result<Option<Registration>, DutyError> {
        self.inner.find_registration(id).await
    }

    async fn find_active_registration(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, DutyError> {
        self.inner.find_active_registration(slot_id, user_id).await
    }

    async fn list_active_registrations(
        &self,
        slot_id: Uuid,
    ) -> Result<Vec<Registration>, DutyError> {
        self.inner.list_active_registrations(slot_id).await
    }

    async fn set_swap_offered(
        &self,
        registration_id: Uuid,
        offered: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        self.inner.set_swap_offered(registration_id, offered, now).await
    }

    async fn transfer_registration(
        &self,
        registration_id: Uuid,
        transferee: &Transferee,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        self.inner
            .transfer_registration(registration_id, transferee, now)
            .await
    }

    async fn record_check_in(
        &self,
        registration_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        if let Some(registration) = self.inner.find_registration(registration_id).await? {
            let race = self
                .cancel_before_check_in
                .lock()
                .unwrap()
                .remove(&registration.slot_id);
            if race {
                self.inner
                    .cancel_slot(registration.slot_id, Uuid::new_v4(), Some("Weather"), at)
                    .await?;
            }
        }
        self.inner.record_check_in(registration_id, at).await
    }

    async fn record_check_out(
        &self,
        registration_id: Uuid,
        at: DateTime<Utc>,
        actual_minutes: i32,
    ) -> Result<Option<Registration>, DutyError> {
        self.inner
            .record_check_out(registration_id, at, actual_minutes)
            .await
    }

    async fn mark_no_show(
        &self,
        registration_id: Uuid,
        marked_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        self.inner.mark_no_show(registration_id, marked_by, now).await
    }

    async fn flag_no_shows(&self, slot_id: Uuid, now: DateTime<Utc>) -> Result<u64, DutyError> {
        if self.flags_once.lock().unwrap().remove(&slot_id) {
            return Err(outage());
        }
        self.inner.flag_no_shows(slot_id, now).await
    }

    async fn confirm_registration(
        &self,
        registration_id: Uuid,
        confirmed_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        self.inner
            .confirm_registration(registration_id, confirmed_by, now)
            .await
    }

    async fn list_family_attendance(
        &self,
        family_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<FamilyAttendanceRecord>, DutyError> {
        self.inner.list_family_attendance(family_id, range).await
    }

    async fn list_pending_events(&self, limit: usize) -> Result<Vec<OutboxEvent>, DutyError> {
        self.inner.list_pending_events(limit).await
    }

    async fn mark_event_delivered(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, DutyError> {
        self.inner.mark_event_delivered(id, at).await
    }
}

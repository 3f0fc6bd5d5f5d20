//! In-memory `DutyStore` for development and testing.
//!
//! A single mutex guards all state, so every store call is atomic with
//! respect to every other.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::events::{DutyEvent, OutboxEvent};
use super::slot_lifecycle::SlotLifecycle;
use super::store::{ClaimOutcome, DutyStore, ReleaseOutcome};
use crate::error::DutyError;
use crate::models::{
    DateRange, DutyConfig, FamilyAttendanceRecord, NewDutyConfig, NewRegistration, NewSlot,
    Registration, Slot, SlotOccupancy, SlotStatus, Transferee,
};

#[derive(Debug, Default)]
struct MemoryState {
    configs: HashMap<Uuid, DutyConfig>,
    slots: HashMap<Uuid, Slot>,
    /// Uniqueness of `(config_id, slot_date)`.
    slot_index: HashMap<(Uuid, NaiveDate), Uuid>,
    registrations: HashMap<Uuid, Registration>,
    /// Insertion ordered.
    outbox: Vec<OutboxEntry>,
}

#[derive(Debug)]
struct OutboxEntry {
    event: OutboxEvent,
    delivered_at: Option<DateTime<Utc>>,
}

impl MemoryState {
    fn active_registrations(&self, slot_id: Uuid) -> impl Iterator<Item = &Registration> {
        self.registrations
            .values()
            .filter(move |r| r.slot_id == slot_id && r.is_active())
    }

    fn registered_count(&self, slot_id: Uuid) -> i64 {
        self.active_registrations(slot_id).count() as i64
    }

    fn active_registration_id(&self, slot_id: Uuid, user_id: Uuid) -> Option<Uuid> {
        self.active_registrations(slot_id)
            .find(|r| r.user_id == user_id)
            .map(|r| r.id)
    }

    /// Apply `update` to the registration if `precondition` holds.
    fn update_registration_if(
        &mut self,
        id: Uuid,
        precondition: impl Fn(&Registration) -> bool,
        update: impl FnOnce(&mut Registration),
    ) -> Option<Registration> {
        let registration = self.registrations.get_mut(&id)?;
        if !precondition(registration) {
            return None;
        }
        update(registration);
        Some(registration.clone())
    }
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryDutyStore {
    state: Mutex<MemoryState>,
}

impl InMemoryDutyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored slots, across all configs.
    pub fn slot_count(&self) -> usize {
        self.state().slots.len()
    }

    /// Active registrations on a slot.
    pub fn registered_count(&self, slot_id: Uuid) -> i64 {
        self.state().registered_count(slot_id)
    }

    /// Outbox events not yet marked delivered.
    pub fn pending_event_count(&self) -> usize {
        self.state()
            .outbox
            .iter()
            .filter(|e| e.delivered_at.is_none())
            .count()
    }
}

#[async_trait::async_trait]
impl DutyStore for InMemoryDutyStore {
    async fn insert_config(
        &self,
        config: NewDutyConfig,
        now: DateTime<Utc>,
    ) -> Result<DutyConfig, DutyError> {
        let config = DutyConfig {
            id: Uuid::new_v4(),
            section_id: config.section_id,
            room_id: config.room_id,
            title: config.title,
            schedule: config.schedule,
            start_time: config.start_time,
            end_time: config.end_time,
            min_participants: config.min_participants,
            max_participants: config.max_participants,
            hours_credit: config.hours_credit,
            active: true,
            calendar_event_id: config.calendar_event_id,
            created_by: config.created_by,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state();
        if let Some(event) = DutyEvent::for_new_config(&config, now) {
            state.outbox.push(OutboxEntry {
                event: OutboxEvent {
                    id: Uuid::new_v4(),
                    event,
                    created_at: now,
                },
                delivered_at: None,
            });
        }
        state.configs.insert(config.id, config.clone());
        Ok(config)
    }

    async fn find_config(&self, id: Uuid) -> Result<Option<DutyConfig>, DutyError> {
        Ok(self.state().configs.get(&id).cloned())
    }

    async fn update_config(
        &self,
        config: &DutyConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyConfig>, DutyError> {
        let mut state = self.state();
        let Some(stored) = state.configs.get_mut(&config.id) else {
            return Ok(None);
        };
        stored.title = config.title.clone();
        stored.start_time = config.start_time;
        stored.end_time = config.end_time;
        stored.min_participants = config.min_participants;
        stored.max_participants = config.max_participants;
        stored.hours_credit = config.hours_credit;
        stored.updated_at = now;
        Ok(Some(stored.clone()))
    }

    async fn set_config_active(
        &self,
        id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyConfig>, DutyError> {
        let mut state = self.state();
        Ok(state.configs.get_mut(&id).map(|config| {
            config.active = active;
            config.updated_at = now;
            config.clone()
        }))
    }

    async fn list_active_configs(&self) -> Result<Vec<DutyConfig>, DutyError> {
        let mut configs: Vec<DutyConfig> = self
            .state()
            .configs
            .values()
            .filter(|c| c.active)
            .cloned()
            .collect();
        configs.sort_by_key(|c| c.created_at);
        Ok(configs)
    }

    async fn insert_slot_if_absent(
        &self,
        slot: NewSlot,
        now: DateTime<Utc>,
    ) -> Result<Option<Slot>, DutyError> {
        let mut state = self.state();
        let key = (slot.config_id, slot.slot_date);
        if state.slot_index.contains_key(&key) {
            return Ok(None);
        }

        let slot = Slot {
            id: Uuid::new_v4(),
            config_id: slot.config_id,
            section_id: slot.section_id,
            slot_date: slot.slot_date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            min_participants: slot.min_participants,
            max_participants: slot.max_participants,
            hours_credit: slot.hours_credit,
            status: SlotStatus::Open,
            cancelled: false,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            qr_token: slot.qr_token,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.slot_index.insert(key, slot.id);
        state.slots.insert(slot.id, slot.clone());
        Ok(Some(slot))
    }

    async fn find_slot(&self, id: Uuid) -> Result<Option<Slot>, DutyError> {
        Ok(self.state().slots.get(&id).cloned())
    }

    async fn list_slots(
        &self,
        range: DateRange,
        section_id: Option<Uuid>,
    ) -> Result<Vec<SlotOccupancy>, DutyError> {
        let state = self.state();
        let mut slots: Vec<SlotOccupancy> = state
            .slots
            .values()
            .filter(|s| range.contains(s.slot_date))
            .filter(|s| section_id.map_or(true, |id| s.section_id == id))
            .map(|s| SlotOccupancy {
                slot: s.clone(),
                registered: state.registered_count(s.id),
            })
            .collect();
        slots.sort_by_key(|o| (o.slot.slot_date, o.slot.start_time, o.slot.id));
        Ok(slots)
    }

    async fn list_unfinished_slots(&self, through: NaiveDate) -> Result<Vec<Slot>, DutyError> {
        let mut slots: Vec<Slot> = self
            .state()
            .slots
            .values()
            .filter(|s| s.slot_date <= through && SlotLifecycle::can_close(s.status))
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.slot_date, s.end_time));
        Ok(slots)
    }

    async fn cancel_slot(
        &self,
        id: Uuid,
        cancelled_by: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Slot>, DutyError> {
        let mut state = self.state();
        let Some(slot) = state.slots.get_mut(&id) else {
            return Ok(None);
        };
        if !SlotLifecycle::can_close(slot.status) {
            return Ok(None);
        }
        slot.status = SlotStatus::Cancelled;
        slot.cancelled = true;
        slot.cancelled_at = Some(now);
        slot.cancelled_by = Some(cancelled_by);
        slot.cancellation_reason = reason.map(str::to_string);
        slot.updated_at = now;
        Ok(Some(slot.clone()))
    }

    async fn complete_slot(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Slot>, DutyError> {
        let mut state = self.state();
        let Some(slot) = state.slots.get_mut(&id) else {
            return Ok(None);
        };
        if !SlotLifecycle::can_close(slot.status) {
            return Ok(None);
        }
        slot.status = SlotStatus::Completed;
        slot.completed_at = Some(now);
        slot.updated_at = now;
        Ok(Some(slot.clone()))
    }

    async fn set_slot_token(
        &self,
        id: Uuid,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Slot>, DutyError> {
        let mut state = self.state();
        let Some(slot) = state.slots.get_mut(&id) else {
            return Ok(None);
        };
        if slot.status.is_terminal() {
            return Ok(None);
        }
        slot.qr_token = token.to_string();
        slot.updated_at = now;
        Ok(Some(slot.clone()))
    }

    async fn claim_spot(
        &self,
        registration: NewRegistration,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, DutyError> {
        let mut state = self.state();
        let slot_id = registration.slot_id;

        let Some(slot) = state.slots.get(&slot_id) else {
            return Ok(ClaimOutcome::SlotNotFound);
        };
        if slot.status.is_terminal() {
            return Ok(ClaimOutcome::SlotClosed(slot.status));
        }
        let (current, max) = (slot.status, slot.max_participants);

        if state
            .active_registration_id(slot_id, registration.user_id)
            .is_some()
        {
            return Ok(ClaimOutcome::AlreadyRegistered);
        }
        let registered = state.registered_count(slot_id);
        if registered >= max as i64 {
            return Ok(ClaimOutcome::Full);
        }

        let registration = Registration::new(Uuid::new_v4(), registration, now);
        state
            .registrations
            .insert(registration.id, registration.clone());

        let slot_status = SlotLifecycle::after_claim(current, registered + 1, max);
        if let Some(slot) = state.slots.get_mut(&slot_id) {
            if slot.status != slot_status {
                slot.status = slot_status;
                slot.updated_at = now;
            }
        }

        Ok(ClaimOutcome::Claimed {
            registration,
            slot_status,
        })
    }

    async fn release_spot(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, DutyError> {
        let mut state = self.state();

        let Some(slot) = state.slots.get(&slot_id) else {
            return Ok(ReleaseOutcome::SlotNotFound);
        };
        if slot.status.is_terminal() {
            return Ok(ReleaseOutcome::SlotClosed(slot.status));
        }
        let (current, max) = (slot.status, slot.max_participants);

        let Some(registration_id) = state.active_registration_id(slot_id, user_id) else {
            return Ok(ReleaseOutcome::NotRegistered);
        };
        let registration = match state.registrations.get_mut(&registration_id) {
            Some(r) if r.checked_in => return Ok(ReleaseOutcome::CheckedIn),
            Some(r) => {
                r.cancelled_at = Some(now);
                r.swap_offered = false;
                r.updated_at = now;
                r.clone()
            }
            None => return Ok(ReleaseOutcome::NotRegistered),
        };

        let registered = state.registered_count(slot_id);
        let slot_status = SlotLifecycle::after_release(current, registered, max);
        if let Some(slot) = state.slots.get_mut(&slot_id) {
            if slot.status != slot_status {
                slot.status = slot_status;
                slot.updated_at = now;
            }
        }

        Ok(ReleaseOutcome::Released {
            registration,
            slot_status,
        })
    }

    async fn find_registration(&self, id: Uuid) -> Result<Option<Registration>, DutyError> {
        Ok(self.state().registrations.get(&id).cloned())
    }

    async fn find_active_registration(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, DutyError> {
        let state = self.state();
        Ok(state
            .active_registration_id(slot_id, user_id)
            .and_then(|id| state.registrations.get(&id).cloned()))
    }

    async fn list_active_registrations(
        &self,
        slot_id: Uuid,
    ) -> Result<Vec<Registration>, DutyError> {
        let state = self.state();
        let mut registrations: Vec<Registration> =
            state.active_registrations(slot_id).cloned().collect();
        registrations.sort_by_key(|r| (r.created_at, r.id));
        Ok(registrations)
    }

    async fn set_swap_offered(
        &self,
        registration_id: Uuid,
        offered: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        Ok(self.state().update_registration_if(
            registration_id,
            |r| r.is_active() && !r.checked_in,
            |r| {
                r.swap_offered = offered;
                r.updated_at = now;
            },
        ))
    }

    async fn transfer_registration(
        &self,
        registration_id: Uuid,
        transferee: &Transferee,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        let mut state = self.state();
        let Some(slot_id) = state.registrations.get(&registration_id).map(|r| r.slot_id) else {
            return Ok(None);
        };
        if state
            .active_registration_id(slot_id, transferee.user_id)
            .is_some()
        {
            return Err(DutyError::Conflict(
                "User already holds a registration on this slot".to_string(),
            ));
        }
        Ok(state.update_registration_if(
            registration_id,
            |r| r.is_active() && r.swap_offered && !r.checked_in,
            |r| r.transfer_to(transferee, now),
        ))
    }

    async fn record_check_in(
        &self,
        registration_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        let mut state = self.state();
        let slot_cancelled = state
            .registrations
            .get(&registration_id)
            .and_then(|r| state.slots.get(&r.slot_id))
            .map_or(true, |slot| slot.status == SlotStatus::Cancelled);
        if slot_cancelled {
            return Ok(None);
        }
        Ok(state.update_registration_if(
            registration_id,
            |r| r.is_active() && !r.checked_in && !r.no_show,
            |r| {
                r.checked_in = true;
                r.check_in_at = Some(at);
                r.swap_offered = false;
                r.updated_at = at;
            },
        ))
    }

    async fn record_check_out(
        &self,
        registration_id: Uuid,
        at: DateTime<Utc>,
        actual_minutes: i32,
    ) -> Result<Option<Registration>, DutyError> {
        Ok(self.state().update_registration_if(
            registration_id,
            |r| r.is_active() && r.checked_in && !r.checked_out,
            |r| {
                r.checked_out = true;
                r.check_out_at = Some(at);
                r.actual_minutes = Some(actual_minutes);
                r.updated_at = at;
            },
        ))
    }

    async fn mark_no_show(
        &self,
        registration_id: Uuid,
        marked_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        Ok(self.state().update_registration_if(
            registration_id,
            |r| r.is_active() && !r.checked_in && !r.confirmed && !r.no_show,
            |r| {
                r.no_show = true;
                r.no_show_marked_by = marked_by;
                r.swap_offered = false;
                r.updated_at = now;
            },
        ))
    }

    async fn flag_no_shows(&self, slot_id: Uuid, now: DateTime<Utc>) -> Result<u64, DutyError> {
        let mut state = self.state();
        let mut flagged = 0;
        for registration in state.registrations.values_mut().filter(|r| {
            r.slot_id == slot_id && r.is_active() && !r.checked_in && !r.confirmed && !r.no_show
        }) {
            registration.no_show = true;
            registration.swap_offered = false;
            registration.updated_at = now;
            flagged += 1;
        }
        Ok(flagged)
    }

    async fn confirm_registration(
        &self,
        registration_id: Uuid,
        confirmed_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        Ok(self.state().update_registration_if(
            registration_id,
            |r| r.is_active() && r.checked_out && !r.no_show && !r.confirmed,
            |r| {
                r.confirmed = true;
                r.confirmed_by = Some(confirmed_by);
                r.confirmed_at = Some(now);
                r.updated_at = now;
            },
        ))
    }

    async fn list_family_attendance(
        &self,
        family_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<FamilyAttendanceRecord>, DutyError> {
        let state = self.state();
        let mut records: Vec<FamilyAttendanceRecord> = state
            .registrations
            .values()
            .filter(|r| r.family_id == family_id && r.is_active())
            .filter_map(|r| {
                let slot = state.slots.get(&r.slot_id)?;
                range.contains(slot.slot_date).then(|| FamilyAttendanceRecord {
                    registration: r.clone(),
                    slot_date: slot.slot_date,
                    scheduled_minutes: slot.scheduled_minutes(),
                    hours_credit: slot.hours_credit,
                })
            })
            .collect();
        records.sort_by_key(|r| (r.slot_date, r.registration.id));
        Ok(records)
    }

    async fn list_pending_events(&self, limit: usize) -> Result<Vec<OutboxEvent>, DutyError> {
        Ok(self
            .state()
            .outbox
            .iter()
            .filter(|e| e.delivered_at.is_none())
            .take(limit)
            .map(|e| e.event.clone())
            .collect())
    }

    async fn mark_event_delivered(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, DutyError> {
        let mut state = self.state();
        match state
            .outbox
            .iter_mut()
            .find(|e| e.event.id == id && e.delivered_at.is_none())
        {
            Some(entry) => {
                entry.delivered_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

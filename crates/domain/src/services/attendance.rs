//! Check-in, check-out, no-show and confirmation of attendance.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use super::clock::Clock;
use super::store::DutyStore;
use crate::error::DutyError;
use crate::models::{DutySettings, Registration, Slot, SlotStatus};

/// Minutes between check-in and check-out, clamped to
/// `[0, scheduled_minutes + grace_minutes]`.
pub fn compute_actual_minutes(
    check_in_at: DateTime<Utc>,
    check_out_at: DateTime<Utc>,
    scheduled_minutes: i64,
    grace_minutes: i64,
) -> i32 {
    let cap = (scheduled_minutes + grace_minutes.max(0)).max(0);
    let elapsed = (check_out_at - check_in_at).num_minutes();
    elapsed.clamp(0, cap).min(i32::MAX as i64) as i32
}

pub struct AttendanceTracker {
    store: Arc<dyn DutyStore>,
    clock: Arc<dyn Clock>,
    settings: DutySettings,
}

impl AttendanceTracker {
    pub fn new(store: Arc<dyn DutyStore>, clock: Arc<dyn Clock>, settings: DutySettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// Record arrival. The token must match the slot's current credential and
    /// the call must fall inside the check-in window.
    pub async fn check_in(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
        token: &str,
    ) -> Result<Registration, DutyError> {
        let slot = self.load_slot(slot_id).await?;
        if slot.status == SlotStatus::Cancelled {
            return Err(DutyError::Forbidden("Slot has been cancelled".to_string()));
        }
        if !shared::crypto::tokens_match(token, &slot.qr_token) {
            return Err(DutyError::Forbidden("Invalid check-in token".to_string()));
        }
        if slot.status == SlotStatus::Completed {
            return Err(DutyError::State("Slot has already been completed".to_string()));
        }

        let now = self.clock.now();
        if !self.within_check_in_window(&slot, now) {
            return Err(DutyError::Forbidden(
                "Check-in is not open for this slot".to_string(),
            ));
        }

        let registration = self.load_active_registration(slot_id, user_id).await?;
        ensure_can_check_in(&registration)?;

        match self.store.record_check_in(registration.id, now).await? {
            Some(registration) => {
                info!(
                    slot_id = %slot_id,
                    user_id = %user_id,
                    registration_id = %registration.id,
                    "Checked in"
                );
                Ok(registration)
            }
            None => {
                if self.load_slot(slot_id).await?.status == SlotStatus::Cancelled {
                    return Err(DutyError::Forbidden("Slot has been cancelled".to_string()));
                }
                let current = self.load_active_registration(slot_id, user_id).await?;
                ensure_can_check_in(&current)?;
                Err(DutyError::State("Check-in could not be recorded".to_string()))
            }
        }
    }

    /// Record departure and the credited minutes. Allowed on completed slots
    /// so a forgotten check-out can still be recorded.
    pub async fn check_out(&self, slot_id: Uuid, user_id: Uuid) -> Result<Registration, DutyError> {
        let slot = self.load_slot(slot_id).await?;
        if slot.status == SlotStatus::Cancelled {
            return Err(DutyError::State("Slot has been cancelled".to_string()));
        }

        let registration = self.load_active_registration(slot_id, user_id).await?;
        let check_in_at = ensure_can_check_out(&registration)?;

        let now = self.clock.now();
        let actual_minutes = compute_actual_minutes(
            check_in_at,
            now,
            slot.scheduled_minutes(),
            self.settings.checkout_grace_minutes,
        );

        match self
            .store
            .record_check_out(registration.id, now, actual_minutes)
            .await?
        {
            Some(registration) => {
                info!(
                    slot_id = %slot_id,
                    user_id = %user_id,
                    registration_id = %registration.id,
                    actual_minutes = actual_minutes,
                    "Checked out"
                );
                Ok(registration)
            }
            None => {
                let current = self.load_active_registration(slot_id, user_id).await?;
                ensure_can_check_out(&current)?;
                Err(DutyError::State("Check-out could not be recorded".to_string()))
            }
        }
    }

    /// Flag a registration whose holder never showed up. Only possible once
    /// the slot has ended.
    pub async fn mark_no_show(
        &self,
        registration_id: Uuid,
        admin_id: Uuid,
    ) -> Result<Registration, DutyError> {
        let registration = self.load_registration(registration_id).await?;
        ensure_can_mark_no_show(&registration)?;

        let slot = self.load_slot(registration.slot_id).await?;
        if slot.status == SlotStatus::Cancelled {
            return Err(DutyError::State("Slot has been cancelled".to_string()));
        }
        let now = self.clock.now();
        if !slot.has_ended(now, self.settings.offset()) {
            return Err(DutyError::State("Slot has not ended yet".to_string()));
        }

        match self
            .store
            .mark_no_show(registration_id, Some(admin_id), now)
            .await?
        {
            Some(registration) => {
                info!(
                    registration_id = %registration_id,
                    slot_id = %registration.slot_id,
                    admin_id = %admin_id,
                    "Marked as no-show"
                );
                Ok(registration)
            }
            None => {
                let current = self.load_registration(registration_id).await?;
                ensure_can_mark_no_show(&current)?;
                Err(DutyError::State("No-show could not be recorded".to_string()))
            }
        }
    }

    /// Approve the recorded minutes so they count toward the family's hours.
    pub async fn confirm(
        &self,
        registration_id: Uuid,
        admin_id: Uuid,
    ) -> Result<Registration, DutyError> {
        let registration = self.load_registration(registration_id).await?;
        ensure_can_confirm(&registration)?;

        let now = self.clock.now();
        match self
            .store
            .confirm_registration(registration_id, admin_id, now)
            .await?
        {
            Some(registration) => {
                info!(
                    registration_id = %registration_id,
                    family_id = %registration.family_id,
                    admin_id = %admin_id,
                    actual_minutes = registration.actual_minutes.unwrap_or(0),
                    "Attendance confirmed"
                );
                Ok(registration)
            }
            None => {
                let current = self.load_registration(registration_id).await?;
                ensure_can_confirm(&current)?;
                Err(DutyError::State("Confirmation could not be recorded".to_string()))
            }
        }
    }

    fn within_check_in_window(&self, slot: &Slot, now: DateTime<Utc>) -> bool {
        let offset = self.settings.offset();
        let opens = slot.starts_at(offset) - Duration::minutes(self.settings.check_in_lead_minutes);
        now >= opens && now < slot.ends_at(offset)
    }

    async fn load_slot(&self, slot_id: Uuid) -> Result<Slot, DutyError> {
        self.store
            .find_slot(slot_id)
            .await?
            .ok_or_else(|| DutyError::NotFound("Slot not found".to_string()))
    }

    async fn load_registration(&self, registration_id: Uuid) -> Result<Registration, DutyError> {
        self.store
            .find_registration(registration_id)
            .await?
            .ok_or_else(|| DutyError::NotFound("Registration not found".to_string()))
    }

    async fn load_active_registration(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Registration, DutyError> {
        self.store
            .find_active_registration(slot_id, user_id)
            .await?
            .ok_or_else(|| DutyError::State("User is not registered for this slot".to_string()))
    }
}

fn ensure_can_check_in(registration: &Registration) -> Result<(), DutyError> {
    if registration.no_show {
        return Err(DutyError::State("Registration is marked as no-show".to_string()));
    }
    if registration.checked_in {
        return Err(DutyError::State("Already checked in".to_string()));
    }
    Ok(())
}

fn ensure_can_check_out(registration: &Registration) -> Result<DateTime<Utc>, DutyError> {
    if registration.checked_out {
        return Err(DutyError::State("Already checked out".to_string()));
    }
    match (registration.checked_in, registration.check_in_at) {
        (true, Some(at)) => Ok(at),
        _ => Err(DutyError::State("Not checked in".to_string())),
    }
}

fn ensure_can_mark_no_show(registration: &Registration) -> Result<(), DutyError> {
    if !registration.is_active() {
        return Err(DutyError::State("Registration has been cancelled".to_string()));
    }
    if registration.checked_in {
        return Err(DutyError::State("User has checked in".to_string()));
    }
    if registration.confirmed {
        return Err(DutyError::State("Registration is already confirmed".to_string()));
    }
    if registration.no_show {
        return Err(DutyError::State("Already marked as no-show".to_string()));
    }
    Ok(())
}

fn ensure_can_confirm(registration: &Registration) -> Result<(), DutyError> {
    if !registration.is_active() {
        return Err(DutyError::State("Registration has been cancelled".to_string()));
    }
    if registration.no_show {
        return Err(DutyError::State("Registration is marked as no-show".to_string()));
    }
    if !registration.checked_out {
        return Err(DutyError::State("User has not checked out".to_string()));
    }
    if registration.confirmed {
        return Err(DutyError::State("Already confirmed".to_string()));
    }
    Ok(())
}

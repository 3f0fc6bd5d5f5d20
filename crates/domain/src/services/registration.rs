//! Registration, unregistration and swap handling.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::clock::Clock;
use super::slot_lifecycle::SlotLifecycle;
use super::store::{ClaimOutcome, DutyStore, ReleaseOutcome};
use crate::error::DutyError;
use crate::models::{NewRegistration, Registration, Slot, SlotStatus, Transferee};

pub struct RegistrationManager {
    store: Arc<dyn DutyStore>,
    clock: Arc<dyn Clock>,
}

impl RegistrationManager {
    pub fn new(store: Arc<dyn DutyStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Claim a spot on a slot. The store serializes the capacity check.
    pub async fn register(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
        user_name: &str,
        family_id: Uuid,
    ) -> Result<Registration, DutyError> {
        let request = NewRegistration {
            slot_id,
            user_id,
            user_name: user_name.trim().to_string(),
            family_id,
        };
        request.validate()?;

        match self.store.claim_spot(request, self.clock.now()).await? {
            ClaimOutcome::Claimed {
                registration,
                slot_status,
            } => {
                info!(
                    slot_id = %slot_id,
                    user_id = %user_id,
                    family_id = %family_id,
                    registration_id = %registration.id,
                    slot_status = %slot_status,
                    "Registered for slot"
                );
                Ok(registration)
            }
            ClaimOutcome::SlotNotFound => Err(slot_not_found()),
            ClaimOutcome::SlotClosed(SlotStatus::Completed) => Err(DutyError::State(
                "Cannot register for a completed slot".to_string(),
            )),
            ClaimOutcome::SlotClosed(_) => Err(DutyError::Conflict(
                "Slot has been cancelled".to_string(),
            )),
            ClaimOutcome::AlreadyRegistered => Err(DutyError::Conflict(
                "User is already registered for this slot".to_string(),
            )),
            ClaimOutcome::Full => Err(DutyError::Conflict("Slot is full".to_string())),
        }
    }

    /// Give a spot back. The registration is kept, marked cancelled.
    pub async fn unregister(&self, slot_id: Uuid, user_id: Uuid) -> Result<Registration, DutyError> {
        match self.store.release_spot(slot_id, user_id, self.clock.now()).await? {
            ReleaseOutcome::Released {
                registration,
                slot_status,
            } => {
                info!(
                    slot_id = %slot_id,
                    user_id = %user_id,
                    registration_id = %registration.id,
                    slot_status = %slot_status,
                    "Unregistered from slot"
                );
                Ok(registration)
            }
            ReleaseOutcome::SlotNotFound => Err(slot_not_found()),
            ReleaseOutcome::SlotClosed(status) => Err(DutyError::State(format!(
                "Cannot unregister from a {} slot",
                status
            ))),
            ReleaseOutcome::NotRegistered => Err(not_registered()),
            ReleaseOutcome::CheckedIn => Err(DutyError::State(
                "Cannot unregister after checking in".to_string(),
            )),
        }
    }

    /// Advertise a registration as available for another user to take.
    pub async fn offer_swap(&self, slot_id: Uuid, user_id: Uuid) -> Result<Registration, DutyError> {
        self.set_swap_offer(slot_id, user_id, true).await
    }

    pub async fn withdraw_swap_offer(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Registration, DutyError> {
        self.set_swap_offer(slot_id, user_id, false).await
    }

    /// Active registrations on the slot currently offered for swap.
    pub async fn get_swap_offers(&self, slot_id: Uuid) -> Result<Vec<Registration>, DutyError> {
        self.load_slot(slot_id).await?;
        let registrations = self.store.list_active_registrations(slot_id).await?;
        Ok(registrations.into_iter().filter(|r| r.swap_offered).collect())
    }

    /// Active registrations on the slot, oldest first.
    pub async fn list_registrations(&self, slot_id: Uuid) -> Result<Vec<Registration>, DutyError> {
        self.load_slot(slot_id).await?;
        self.store.list_active_registrations(slot_id).await
    }

    /// Take over a registration offered for swap. Capacity is unchanged.
    pub async fn claim_swap(
        &self,
        registration_id: Uuid,
        user_id: Uuid,
        user_name: &str,
        family_id: Uuid,
    ) -> Result<Registration, DutyError> {
        let transferee = Transferee {
            user_id,
            user_name: user_name.trim().to_string(),
            family_id,
        };
        transferee.validate()?;

        let offered = self.load_registration(registration_id).await?;
        if offered.user_id == user_id {
            return Err(DutyError::Conflict(
                "Cannot claim your own swap offer".to_string(),
            ));
        }
        ensure_swappable(&offered)?;
        let slot = self.load_slot(offered.slot_id).await?;
        SlotLifecycle::ensure_not_terminal(slot.status, "claim a swap")?;

        let now = self.clock.now();
        match self
            .store
            .transfer_registration(registration_id, &transferee, now)
            .await?
        {
            Some(registration) => {
                info!(
                    registration_id = %registration_id,
                    slot_id = %registration.slot_id,
                    from_user_id = %offered.user_id,
                    to_user_id = %user_id,
                    "Swap claimed"
                );
                Ok(registration)
            }
            None => {
                // Lost a race: someone else claimed, withdrew or checked in.
                let current = self.load_registration(registration_id).await?;
                ensure_swappable(&current)?;
                Err(DutyError::Conflict("Swap offer is no longer available".to_string()))
            }
        }
    }

    async fn set_swap_offer(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
        offered: bool,
    ) -> Result<Registration, DutyError> {
        let action = if offered { "offer a swap" } else { "withdraw a swap offer" };
        let slot = self.load_slot(slot_id).await?;
        SlotLifecycle::ensure_not_terminal(slot.status, action)?;

        let registration = self
            .store
            .find_active_registration(slot_id, user_id)
            .await?
            .ok_or_else(not_registered)?;
        if registration.checked_in {
            return Err(DutyError::State(format!(
                "Cannot {} after checking in",
                action
            )));
        }

        let now = self.clock.now();
        let updated = self
            .store
            .set_swap_offered(registration.id, offered, now)
            .await?
            .ok_or_else(|| DutyError::State(format!("Cannot {} for this registration", action)))?;

        info!(
            slot_id = %slot_id,
            user_id = %user_id,
            registration_id = %updated.id,
            swap_offered = offered,
            "Swap offer updated"
        );
        Ok(updated)
    }

    async fn load_slot(&self, slot_id: Uuid) -> Result<Slot, DutyError> {
        self.store.find_slot(slot_id).await?.ok_or_else(slot_not_found)
    }

    async fn load_registration(&self, registration_id: Uuid) -> Result<Registration, DutyError> {
        self.store
            .find_registration(registration_id)
            .await?
            .ok_or_else(|| DutyError::NotFound("Registration not found".to_string()))
    }
}

fn ensure_swappable(registration: &Registration) -> Result<(), DutyError> {
    if !registration.is_active() {
        return Err(DutyError::State("Registration has been cancelled".to_string()));
    }
    if registration.checked_in {
        return Err(DutyError::State(
            "Registration holder has already checked in".to_string(),
        ));
    }
    if !registration.swap_offered {
        return Err(DutyError::State("Registration is not offered for swap".to_string()));
    }
    Ok(())
}

fn slot_not_found() -> DutyError {
    DutyError::NotFound("Slot not found".to_string())
}

fn not_registered() -> DutyError {
    DutyError::NotFound("User is not registered for this slot".to_string())
}

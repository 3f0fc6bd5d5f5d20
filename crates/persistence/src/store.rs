//! PostgreSQL implementation of the duty storage port.

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{
    DateRange, DutyConfig, FamilyAttendanceRecord, NewDutyConfig, NewRegistration, NewSlot,
    Registration, Slot, SlotOccupancy, Transferee,
};
use domain::services::{ClaimOutcome, DutyEvent, DutyStore, OutboxEvent, ReleaseOutcome};
use domain::DutyError;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::repositories::{
    DutyConfigRepository, DutyEventOutboxRepository, DutyRegistrationRepository,
    DutySlotRepository,
};

/// `DutyStore` backed by the duty tables.
#[derive(Clone)]
pub struct PgDutyStore {
    pool: PgPool,
    configs: DutyConfigRepository,
    outbox: DutyEventOutboxRepository,
    slots: DutySlotRepository,
    registrations: DutyRegistrationRepository,
}

impl PgDutyStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            configs: DutyConfigRepository::new(pool.clone()),
            outbox: DutyEventOutboxRepository::new(pool.clone()),
            slots: DutySlotRepository::new(pool.clone()),
            registrations: DutyRegistrationRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait::async_trait]
impl DutyStore for PgDutyStore {
    async fn insert_config(
        &self,
        config: NewDutyConfig,
        now: DateTime<Utc>,
    ) -> Result<DutyConfig, DutyError> {
        let mut tx = self.pool.begin().await?;
        let created: DutyConfig = DutyConfigRepository::create_in_tx(&mut tx, &config, now)
            .await?
            .try_into()?;

        if let Some(event) = DutyEvent::for_new_config(&created, now) {
            let payload = serde_json::to_value(&event)
                .map_err(|e| DutyError::Storage(format!("Failed to encode duty event: {}", e)))?;
            DutyEventOutboxRepository::insert_in_tx(
                &mut tx,
                event.event_type(),
                event.aggregate_id(),
                &payload,
                event.occurred_at(),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn find_config(&self, id: Uuid) -> Result<Option<DutyConfig>, DutyError> {
        self.configs
            .find_by_id(id)
            .await?
            .map(DutyConfig::try_from)
            .transpose()
    }

    async fn update_config(
        &self,
        config: &DutyConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyConfig>, DutyError> {
        self.configs
            .update(config, now)
            .await?
            .map(DutyConfig::try_from)
            .transpose()
    }

    async fn set_config_active(
        &self,
        id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyConfig>, DutyError> {
        self.configs
            .set_active(id, active, now)
            .await?
            .map(DutyConfig::try_from)
            .transpose()
    }

    async fn list_active_configs(&self) -> Result<Vec<DutyConfig>, DutyError> {
        self.configs
            .list_active()
            .await?
            .into_iter()
            .map(DutyConfig::try_from)
            .collect()
    }

    async fn insert_slot_if_absent(
        &self,
        slot: NewSlot,
        now: DateTime<Utc>,
    ) -> Result<Option<Slot>, DutyError> {
        Ok(self.slots.insert_if_absent(&slot, now).await?.map(Into::into))
    }

    async fn find_slot(&self, id: Uuid) -> Result<Option<Slot>, DutyError> {
        Ok(self.slots.find_by_id(id).await?.map(Into::into))
    }

    async fn list_slots(
        &self,
        range: DateRange,
        section_id: Option<Uuid>,
    ) -> Result<Vec<SlotOccupancy>, DutyError> {
        Ok(self
            .slots
            .list_in_range(range.from, range.to, section_id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn list_unfinished_slots(&self, through: NaiveDate) -> Result<Vec<Slot>, DutyError> {
        Ok(self
            .slots
            .list_unfinished(through)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn cancel_slot(
        &self,
        id: Uuid,
        cancelled_by: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Slot>, DutyError> {
        Ok(self
            .slots
            .cancel(id, cancelled_by, reason, now)
            .await?
            .map(Into::into))
    }

    async fn complete_slot(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Slot>, DutyError> {
        Ok(self.slots.complete(id, now).await?.map(Into::into))
    }

    async fn set_slot_token(
        &self,
        id: Uuid,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Slot>, DutyError> {
        Ok(self.slots.set_token(id, token, now).await?.map(Into::into))
    }

    async fn claim_spot(
        &self,
        registration: NewRegistration,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, DutyError> {
        match self.registrations.claim(&registration, now).await {
            Ok(outcome) => Ok(outcome),
            // A concurrent claim by the same user can still race past the
            // existence check into the partial unique index.
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                debug!(
                    slot_id = %registration.slot_id,
                    user_id = %registration.user_id,
                    "Concurrent duplicate claim rejected by unique index"
                );
                Ok(ClaimOutcome::AlreadyRegistered)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn release_spot(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, DutyError> {
        Ok(self.registrations.release(slot_id, user_id, now).await?)
    }

    async fn find_registration(&self, id: Uuid) -> Result<Option<Registration>, DutyError> {
        Ok(self.registrations.find_by_id(id).await?.map(Into::into))
    }

    async fn find_active_registration(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, DutyError> {
        Ok(self
            .registrations
            .find_active(slot_id, user_id)
            .await?
            .map(Into::into))
    }

    async fn list_active_registrations(
        &self,
        slot_id: Uuid,
    ) -> Result<Vec<Registration>, DutyError> {
        Ok(self
            .registrations
            .list_active(slot_id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn set_swap_offered(
        &self,
        registration_id: Uuid,
        offered: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        Ok(self
            .registrations
            .set_swap_offered(registration_id, offered, now)
            .await?
            .map(Into::into))
    }

    async fn transfer_registration(
        &self,
        registration_id: Uuid,
        transferee: &Transferee,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        match self
            .registrations
            .transfer(registration_id, transferee, now)
            .await
        {
            Ok(entity) => Ok(entity.map(Into::into)),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => Err(
                DutyError::Conflict("User already holds a registration on this slot".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn record_check_in(
        &self,
        registration_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        Ok(self
            .registrations
            .record_check_in(registration_id, at)
            .await?
            .map(Into::into))
    }

    async fn record_check_out(
        &self,
        registration_id: Uuid,
        at: DateTime<Utc>,
        actual_minutes: i32,
    ) -> Result<Option<Registration>, DutyError> {
        Ok(self
            .registrations
            .record_check_out(registration_id, at, actual_minutes)
            .await?
            .map(Into::into))
    }

    async fn mark_no_show(
        &self,
        registration_id: Uuid,
        marked_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        Ok(self
            .registrations
            .mark_no_show(registration_id, marked_by, now)
            .await?
            .map(Into::into))
    }

    async fn flag_no_shows(&self, slot_id: Uuid, now: DateTime<Utc>) -> Result<u64, DutyError> {
        Ok(self.registrations.flag_no_shows(slot_id, now).await?)
    }

    async fn confirm_registration(
        &self,
        registration_id: Uuid,
        confirmed_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError> {
        Ok(self
            .registrations
            .confirm(registration_id, confirmed_by, now)
            .await?
            .map(Into::into))
    }

    async fn list_family_attendance(
        &self,
        family_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<FamilyAttendanceRecord>, DutyError> {
        Ok(self
            .registrations
            .list_family_attendance(family_id, range.from, range.to)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn list_pending_events(&self, limit: usize) -> Result<Vec<OutboxEvent>, DutyError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(self
            .outbox
            .list_pending(limit)
            .await?
            .into_iter()
            .filter_map(|entity| {
                let id = entity.id;
                let event_type = entity.event_type.clone();
                OutboxEvent::try_from(entity)
                    .map_err(|e| {
                        warn!(
                            event_id = %id,
                            event_type = %event_type,
                            error = %e,
                            "Skipping undecodable duty event"
                        );
                    })
                    .ok()
            })
            .collect())
    }

    async fn mark_event_delivered(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, DutyError> {
        Ok(self.outbox.mark_delivered(id, at).await?)
    }
}

//! Duty registration repository for database operations.

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{NewRegistration, SlotStatus, Transferee};
use domain::services::{ClaimOutcome, ReleaseOutcome, SlotLifecycle};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::duty_slot::SLOT_COLUMNS;
use crate::entities::{
    DutyRegistrationEntity, DutySlotEntity, FamilyAttendanceEntity, SlotStatusDb,
};
use crate::metrics::QueryTimer;

const REGISTRATION_COLUMNS: &str = "id, slot_id, user_id, user_name, family_id, checked_in, \
     check_in_at, checked_out, check_out_at, actual_minutes, no_show, no_show_marked_by, \
     swap_offered, confirmed, confirmed_by, confirmed_at, cancelled_at, created_at, updated_at";

/// Repository for registration and attendance operations.
#[derive(Clone)]
pub struct DutyRegistrationRepository {
    pool: PgPool,
}

impl DutyRegistrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Claim a spot. The slot row is locked for the duration of the
    /// check-and-insert so concurrent claims on one slot serialize.
    pub async fn claim(
        &self,
        registration: &NewRegistration,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, sqlx::Error> {
        let timer = QueryTimer::new("claim_duty_slot_spot");
        let result = self.claim_in_tx(registration, now).await;
        timer.record();
        result
    }

    async fn claim_in_tx(
        &self,
        registration: &NewRegistration,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let Some(slot) = lock_slot(&mut tx, registration.slot_id).await? else {
            return Ok(ClaimOutcome::SlotNotFound);
        };
        let status = SlotStatus::from(slot.status);
        if status.is_terminal() {
            return Ok(ClaimOutcome::SlotClosed(status));
        }

        let already_registered: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM duty_registrations
                WHERE slot_id = $1 AND user_id = $2 AND cancelled_at IS NULL
            )
            "#,
        )
        .bind(registration.slot_id)
        .bind(registration.user_id)
        .fetch_one(&mut *tx)
        .await?;
        if already_registered {
            return Ok(ClaimOutcome::AlreadyRegistered);
        }

        let registered = count_active(&mut tx, registration.slot_id).await?;
        if registered >= slot.max_participants as i64 {
            return Ok(ClaimOutcome::Full);
        }

        let entity = sqlx::query_as::<_, DutyRegistrationEntity>(&format!(
            r#"
            INSERT INTO duty_registrations (slot_id, user_id, user_name, family_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {}
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(registration.slot_id)
        .bind(registration.user_id)
        .bind(&registration.user_name)
        .bind(registration.family_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let slot_status = SlotLifecycle::after_claim(status, registered + 1, slot.max_participants);
        if slot_status != status {
            set_slot_status(&mut tx, slot.id, slot_status, now).await?;
        }

        tx.commit().await?;

        Ok(ClaimOutcome::Claimed {
            registration: entity.into(),
            slot_status,
        })
    }

    /// Give a spot back by soft-cancelling the user's active registration.
    pub async fn release(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, sqlx::Error> {
        let timer = QueryTimer::new("release_duty_slot_spot");
        let result = self.release_in_tx(slot_id, user_id, now).await;
        timer.record();
        result
    }

    async fn release_in_tx(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let Some(slot) = lock_slot(&mut tx, slot_id).await? else {
            return Ok(ReleaseOutcome::SlotNotFound);
        };
        let status = SlotStatus::from(slot.status);
        if status.is_terminal() {
            return Ok(ReleaseOutcome::SlotClosed(status));
        }

        let current = sqlx::query_as::<_, DutyRegistrationEntity>(&format!(
            r#"
            SELECT {} FROM duty_registrations
            WHERE slot_id = $1 AND user_id = $2 AND cancelled_at IS NULL
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(slot_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(current) = current else {
            return Ok(ReleaseOutcome::NotRegistered);
        };
        if current.checked_in {
            return Ok(ReleaseOutcome::CheckedIn);
        }

        let entity = sqlx::query_as::<_, DutyRegistrationEntity>(&format!(
            r#"
            UPDATE duty_registrations
            SET cancelled_at = $2, swap_offered = FALSE, updated_at = $2
            WHERE id = $1
            RETURNING {}
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(current.id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let registered = count_active(&mut tx, slot_id).await?;
        let slot_status = SlotLifecycle::after_release(status, registered, slot.max_participants);
        if slot_status != status {
            set_slot_status(&mut tx, slot_id, slot_status, now).await?;
        }

        tx.commit().await?;

        Ok(ReleaseOutcome::Released {
            registration: entity.into(),
            slot_status,
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<DutyRegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_duty_registration_by_id");
        let result = sqlx::query_as::<_, DutyRegistrationEntity>(&format!(
            "SELECT {} FROM duty_registrations WHERE id = $1",
            REGISTRATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_active(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<DutyRegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_active_duty_registration");
        let result = sqlx::query_as::<_, DutyRegistrationEntity>(&format!(
            r#"
            SELECT {} FROM duty_registrations
            WHERE slot_id = $1 AND user_id = $2 AND cancelled_at IS NULL
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(slot_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn list_active(
        &self,
        slot_id: Uuid,
    ) -> Result<Vec<DutyRegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_active_duty_registrations");
        let result = sqlx::query_as::<_, DutyRegistrationEntity>(&format!(
            r#"
            SELECT {} FROM duty_registrations
            WHERE slot_id = $1 AND cancelled_at IS NULL
            ORDER BY created_at, id
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(slot_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn set_swap_offered(
        &self,
        id: Uuid,
        offered: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyRegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_duty_registration_swap_offered");
        let result = sqlx::query_as::<_, DutyRegistrationEntity>(&format!(
            r#"
            UPDATE duty_registrations
            SET swap_offered = $2, updated_at = $3
            WHERE id = $1 AND cancelled_at IS NULL AND NOT checked_in
            RETURNING {}
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(id)
        .bind(offered)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Hand an offered registration to a new holder. A transferee who already
    /// holds a spot on the slot trips the active-registration unique index.
    pub async fn transfer(
        &self,
        id: Uuid,
        transferee: &Transferee,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyRegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("transfer_duty_registration");
        let result = sqlx::query_as::<_, DutyRegistrationEntity>(&format!(
            r#"
            UPDATE duty_registrations
            SET user_id = $2, user_name = $3, family_id = $4,
                checked_in = FALSE, check_in_at = NULL, checked_out = FALSE, check_out_at = NULL,
                actual_minutes = NULL, no_show = FALSE, no_show_marked_by = NULL,
                swap_offered = FALSE, confirmed = FALSE, confirmed_by = NULL, confirmed_at = NULL,
                updated_at = $5
            WHERE id = $1 AND cancelled_at IS NULL AND swap_offered AND NOT checked_in
            RETURNING {}
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(id)
        .bind(transferee.user_id)
        .bind(&transferee.user_name)
        .bind(transferee.family_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn record_check_in(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<DutyRegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("record_duty_check_in");
        let result = sqlx::query_as::<_, DutyRegistrationEntity>(&format!(
            r#"
            UPDATE duty_registrations
            SET checked_in = TRUE, check_in_at = $2, swap_offered = FALSE, updated_at = $2
            WHERE id = $1 AND cancelled_at IS NULL AND NOT checked_in AND NOT no_show
              AND EXISTS (
                  SELECT 1 FROM duty_slots s
                  WHERE s.id = duty_registrations.slot_id AND s.status <> 'cancelled'
              )
            RETURNING {}
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn record_check_out(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        actual_minutes: i32,
    ) -> Result<Option<DutyRegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("record_duty_check_out");
        let result = sqlx::query_as::<_, DutyRegistrationEntity>(&format!(
            r#"
            UPDATE duty_registrations
            SET checked_out = TRUE, check_out_at = $2, actual_minutes = $3, updated_at = $2
            WHERE id = $1 AND cancelled_at IS NULL AND checked_in AND NOT checked_out
            RETURNING {}
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(id)
        .bind(at)
        .bind(actual_minutes)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn mark_no_show(
        &self,
        id: Uuid,
        marked_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyRegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("mark_duty_no_show");
        let result = sqlx::query_as::<_, DutyRegistrationEntity>(&format!(
            r#"
            UPDATE duty_registrations
            SET no_show = TRUE, no_show_marked_by = $2, swap_offered = FALSE, updated_at = $3
            WHERE id = $1 AND cancelled_at IS NULL AND NOT checked_in AND NOT confirmed
              AND NOT no_show
            RETURNING {}
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(id)
        .bind(marked_by)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Flag every active registration on the slot that never checked in.
    pub async fn flag_no_shows(&self, slot_id: Uuid, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("flag_duty_no_shows");
        let result = sqlx::query(
            r#"
            UPDATE duty_registrations
            SET no_show = TRUE, swap_offered = FALSE, updated_at = $2
            WHERE slot_id = $1 AND cancelled_at IS NULL AND NOT checked_in AND NOT confirmed
              AND NOT no_show
            "#,
        )
        .bind(slot_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map(|r| r.rows_affected());
        timer.record();
        result
    }

    pub async fn confirm(
        &self,
        id: Uuid,
        confirmed_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyRegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("confirm_duty_registration");
        let result = sqlx::query_as::<_, DutyRegistrationEntity>(&format!(
            r#"
            UPDATE duty_registrations
            SET confirmed = TRUE, confirmed_by = $2, confirmed_at = $3, updated_at = $3
            WHERE id = $1 AND cancelled_at IS NULL AND checked_out AND NOT no_show
              AND NOT confirmed
            RETURNING {}
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(id)
        .bind(confirmed_by)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// A family's active registrations on slots dated in `[from, to)`.
    pub async fn list_family_attendance(
        &self,
        family_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<FamilyAttendanceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_family_duty_attendance");
        let result = sqlx::query_as::<_, FamilyAttendanceEntity>(
            r#"
            SELECT r.id, r.slot_id, r.user_id, r.user_name, r.family_id, r.checked_in,
                   r.check_in_at, r.checked_out, r.check_out_at, r.actual_minutes, r.no_show,
                   r.no_show_marked_by, r.swap_offered, r.confirmed, r.confirmed_by,
                   r.confirmed_at, r.cancelled_at, r.created_at, r.updated_at,
                   s.slot_date,
                   (EXTRACT(EPOCH FROM (s.end_time - s.start_time)) / 60)::INTEGER AS scheduled_minutes,
                   s.hours_credit
            FROM duty_registrations r
            JOIN duty_slots s ON s.id = r.slot_id
            WHERE r.family_id = $1 AND r.cancelled_at IS NULL
              AND s.slot_date >= $2 AND s.slot_date < $3
            ORDER BY s.slot_date, r.id
            "#,
        )
        .bind(family_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}

async fn lock_slot(
    tx: &mut Transaction<'_, Postgres>,
    slot_id: Uuid,
) -> Result<Option<DutySlotEntity>, sqlx::Error> {
    sqlx::query_as::<_, DutySlotEntity>(&format!(
        "SELECT {} FROM duty_slots WHERE id = $1 FOR UPDATE",
        SLOT_COLUMNS
    ))
    .bind(slot_id)
    .fetch_optional(&mut **tx)
    .await
}

async fn count_active(
    tx: &mut Transaction<'_, Postgres>,
    slot_id: Uuid,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM duty_registrations WHERE slot_id = $1 AND cancelled_at IS NULL",
    )
    .bind(slot_id)
    .fetch_one(&mut **tx)
    .await
}

async fn set_slot_status(
    tx: &mut Transaction<'_, Postgres>,
    slot_id: Uuid,
    status: SlotStatus,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE duty_slots SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(slot_id)
        .bind(SlotStatusDb::from(status))
        .bind(now)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

//! Duty slot repository for database operations.

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::NewSlot;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{DutySlotEntity, DutySlotOccupancyEntity};
use crate::metrics::QueryTimer;

pub(crate) const SLOT_COLUMNS: &str = "id, config_id, section_id, slot_date, start_time, \
     end_time, min_participants, max_participants, hours_credit, status, cancelled, \
     cancelled_at, cancelled_by, cancellation_reason, qr_token, completed_at, created_at, \
     updated_at";

/// Repository for slot operations.
#[derive(Clone)]
pub struct DutySlotRepository {
    pool: PgPool,
}

impl DutySlotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a slot unless the template already has one on that date.
    pub async fn insert_if_absent(
        &self,
        slot: &NewSlot,
        now: DateTime<Utc>,
    ) -> Result<Option<DutySlotEntity>, sqlx::Error> {
        let timer = QueryTimer::new("insert_duty_slot");
        let result = sqlx::query_as::<_, DutySlotEntity>(&format!(
            r#"
            INSERT INTO duty_slots (config_id, section_id, slot_date, start_time, end_time,
                                    min_participants, max_participants, hours_credit, qr_token,
                                    created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            ON CONFLICT (config_id, slot_date) DO NOTHING
            RETURNING {}
            "#,
            SLOT_COLUMNS
        ))
        .bind(slot.config_id)
        .bind(slot.section_id)
        .bind(slot.slot_date)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .bind(slot.min_participants)
        .bind(slot.max_participants)
        .bind(slot.hours_credit)
        .bind(&slot.qr_token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<DutySlotEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_duty_slot_by_id");
        let result = sqlx::query_as::<_, DutySlotEntity>(&format!(
            "SELECT {} FROM duty_slots WHERE id = $1",
            SLOT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Slots dated in `[from, to)` with their active registration counts.
    pub async fn list_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        section_id: Option<Uuid>,
    ) -> Result<Vec<DutySlotOccupancyEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_duty_slots_in_range");
        let result = sqlx::query_as::<_, DutySlotOccupancyEntity>(
            r#"
            SELECT s.id, s.config_id, s.section_id, s.slot_date, s.start_time, s.end_time,
                   s.min_participants, s.max_participants, s.hours_credit, s.status, s.cancelled,
                   s.cancelled_at, s.cancelled_by, s.cancellation_reason, s.qr_token,
                   s.completed_at, s.created_at, s.updated_at,
                   COUNT(r.id) AS registered
            FROM duty_slots s
            LEFT JOIN duty_registrations r ON r.slot_id = s.id AND r.cancelled_at IS NULL
            WHERE s.slot_date >= $1 AND s.slot_date < $2
              AND ($3::UUID IS NULL OR s.section_id = $3)
            GROUP BY s.id
            ORDER BY s.slot_date, s.start_time, s.id
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(section_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Open or full slots dated on or before `through`.
    pub async fn list_unfinished(
        &self,
        through: NaiveDate,
    ) -> Result<Vec<DutySlotEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_unfinished_duty_slots");
        let result = sqlx::query_as::<_, DutySlotEntity>(&format!(
            r#"
            SELECT {} FROM duty_slots
            WHERE status IN ('open', 'full') AND slot_date <= $1
            ORDER BY slot_date, end_time
            "#,
            SLOT_COLUMNS
        ))
        .bind(through)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn cancel(
        &self,
        id: Uuid,
        cancelled_by: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<DutySlotEntity>, sqlx::Error> {
        let timer = QueryTimer::new("cancel_duty_slot");
        let result = sqlx::query_as::<_, DutySlotEntity>(&format!(
            r#"
            UPDATE duty_slots
            SET status = 'cancelled', cancelled = TRUE, cancelled_at = $4, cancelled_by = $2,
                cancellation_reason = $3, updated_at = $4
            WHERE id = $1 AND status IN ('open', 'full')
            RETURNING {}
            "#,
            SLOT_COLUMNS
        ))
        .bind(id)
        .bind(cancelled_by)
        .bind(reason)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn complete(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<DutySlotEntity>, sqlx::Error> {
        let timer = QueryTimer::new("complete_duty_slot");
        let result = sqlx::query_as::<_, DutySlotEntity>(&format!(
            r#"
            UPDATE duty_slots
            SET status = 'completed', completed_at = $2, updated_at = $2
            WHERE id = $1 AND status IN ('open', 'full')
            RETURNING {}
            "#,
            SLOT_COLUMNS
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn set_token(
        &self,
        id: Uuid,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DutySlotEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_duty_slot_token");
        let result = sqlx::query_as::<_, DutySlotEntity>(&format!(
            r#"
            UPDATE duty_slots
            SET qr_token = $2, updated_at = $3
            WHERE id = $1 AND status IN ('open', 'full')
            RETURNING {}
            "#,
            SLOT_COLUMNS
        ))
        .bind(id)
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}

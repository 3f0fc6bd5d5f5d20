//! Duty config repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::{DutyConfig, NewDutyConfig};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::entities::DutyConfigEntity;
use crate::metrics::QueryTimer;

const CONFIG_COLUMNS: &str = "id, section_id, room_id, title, day_of_week, specific_date, \
     start_time, end_time, min_participants, max_participants, hours_credit, active, \
     calendar_event_id, created_by, created_at, updated_at";

/// Repository for duty template operations.
#[derive(Clone)]
pub struct DutyConfigRepository {
    pool: PgPool,
}

impl DutyConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert inside the caller's transaction so dependent rows commit with it.
    pub async fn create_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        config: &NewDutyConfig,
        now: DateTime<Utc>,
    ) -> Result<DutyConfigEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_duty_config");
        let result = sqlx::query_as::<_, DutyConfigEntity>(&format!(
            r#"
            INSERT INTO duty_configs (section_id, room_id, title, day_of_week, specific_date,
                                      start_time, end_time, min_participants, max_participants,
                                      hours_credit, calendar_event_id, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING {}
            "#,
            CONFIG_COLUMNS
        ))
        .bind(config.section_id)
        .bind(config.room_id)
        .bind(&config.title)
        .bind(config.schedule.day_of_week())
        .bind(config.schedule.specific_date())
        .bind(config.start_time)
        .bind(config.end_time)
        .bind(config.min_participants)
        .bind(config.max_participants)
        .bind(config.hours_credit)
        .bind(config.calendar_event_id)
        .bind(config.created_by)
        .bind(now)
        .fetch_one(&mut **tx)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<DutyConfigEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_duty_config_by_id");
        let result = sqlx::query_as::<_, DutyConfigEntity>(&format!(
            "SELECT {} FROM duty_configs WHERE id = $1",
            CONFIG_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Update the editable fields. Schedule and ownership never change.
    pub async fn update(
        &self,
        config: &DutyConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyConfigEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_duty_config");
        let result = sqlx::query_as::<_, DutyConfigEntity>(&format!(
            r#"
            UPDATE duty_configs
            SET title = $2, start_time = $3, end_time = $4, min_participants = $5,
                max_participants = $6, hours_credit = $7, updated_at = $8
            WHERE id = $1
            RETURNING {}
            "#,
            CONFIG_COLUMNS
        ))
        .bind(config.id)
        .bind(&config.title)
        .bind(config.start_time)
        .bind(config.end_time)
        .bind(config.min_participants)
        .bind(config.max_participants)
        .bind(config.hours_credit)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn set_active(
        &self,
        id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyConfigEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_duty_config_active");
        let result = sqlx::query_as::<_, DutyConfigEntity>(&format!(
            "UPDATE duty_configs SET active = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            CONFIG_COLUMNS
        ))
        .bind(id)
        .bind(active)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn list_active(&self) -> Result<Vec<DutyConfigEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_active_duty_configs");
        let result = sqlx::query_as::<_, DutyConfigEntity>(&format!(
            "SELECT {} FROM duty_configs WHERE active ORDER BY created_at",
            CONFIG_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}

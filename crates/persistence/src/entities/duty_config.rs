//! Duty config entity (database row mapping).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use domain::models::{DutyConfig, DutySchedule};
use domain::DutyError;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the duty_configs table.
#[derive(Debug, Clone, FromRow)]
pub struct DutyConfigEntity {
    pub id: Uuid,
    pub section_id: Uuid,
    pub room_id: Option<Uuid>,
    pub title: String,
    pub day_of_week: Option<i16>,
    pub specific_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub min_participants: i32,
    pub max_participants: i32,
    pub hours_credit: f64,
    pub active: bool,
    pub calendar_event_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DutyConfigEntity> for DutyConfig {
    type Error = DutyError;

    fn try_from(entity: DutyConfigEntity) -> Result<Self, Self::Error> {
        let schedule = DutySchedule::from_parts(entity.day_of_week, entity.specific_date)
            .ok_or_else(|| {
                DutyError::Storage(format!("Duty config {} has an invalid schedule", entity.id))
            })?;

        Ok(Self {
            id: entity.id,
            section_id: entity.section_id,
            room_id: entity.room_id,
            title: entity.title,
            schedule,
            start_time: entity.start_time,
            end_time: entity.end_time,
            min_participants: entity.min_participants,
            max_participants: entity.max_participants,
            hours_credit: entity.hours_credit,
            active: entity.active,
            calendar_event_id: entity.calendar_event_id,
            created_by: entity.created_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

//! Duty event outbox entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::services::{DutyEvent, OutboxEvent};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the duty_event_outbox table.
#[derive(Debug, Clone, FromRow)]
pub struct DutyEventEntity {
    pub id: Uuid,
    pub event_type: String,
    pub aggregate_id: Uuid,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DutyEventEntity> for OutboxEvent {
    type Error = serde_json::Error;

    fn try_from(entity: DutyEventEntity) -> Result<Self, Self::Error> {
        Ok(OutboxEvent {
            id: entity.id,
            event: serde_json::from_value::<DutyEvent>(entity.payload)?,
            created_at: entity.created_at,
        })
    }
}

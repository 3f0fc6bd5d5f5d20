//! Duty slot entity (database row mapping).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use domain::models::{Slot, SlotOccupancy, SlotStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for slot status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "duty_slot_status", rename_all = "lowercase")]
pub enum SlotStatusDb {
    Open,
    Full,
    Completed,
    Cancelled,
}

impl From<SlotStatusDb> for SlotStatus {
    fn from(status: SlotStatusDb) -> Self {
        match status {
            SlotStatusDb::Open => SlotStatus::Open,
            SlotStatusDb::Full => SlotStatus::Full,
            SlotStatusDb::Completed => SlotStatus::Completed,
            SlotStatusDb::Cancelled => SlotStatus::Cancelled,
        }
    }
}

impl From<SlotStatus> for SlotStatusDb {
    fn from(status: SlotStatus) -> Self {
        match status {
            SlotStatus::Open => SlotStatusDb::Open,
            SlotStatus::Full => SlotStatusDb::Full,
            SlotStatus::Completed => SlotStatusDb::Completed,
            SlotStatus::Cancelled => SlotStatusDb::Cancelled,
        }
    }
}

/// Database row mapping for the duty_slots table.
#[derive(Debug, Clone, FromRow)]
pub struct DutySlotEntity {
    pub id: Uuid,
    pub config_id: Uuid,
    pub section_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub min_participants: i32,
    pub max_participants: i32,
    pub hours_credit: f64,
    pub status: SlotStatusDb,
    pub cancelled: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub qr_token: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DutySlotEntity> for Slot {
    fn from(entity: DutySlotEntity) -> Self {
        Self {
            id: entity.id,
            config_id: entity.config_id,
            section_id: entity.section_id,
            slot_date: entity.slot_date,
            start_time: entity.start_time,
            end_time: entity.end_time,
            min_participants: entity.min_participants,
            max_participants: entity.max_participants,
            hours_credit: entity.hours_credit,
            status: entity.status.into(),
            cancelled: entity.cancelled,
            cancelled_at: entity.cancelled_at,
            cancelled_by: entity.cancelled_by,
            cancellation_reason: entity.cancellation_reason,
            qr_token: entity.qr_token,
            completed_at: entity.completed_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Slot row joined with its active registration count.
#[derive(Debug, Clone, FromRow)]
pub struct DutySlotOccupancyEntity {
    #[sqlx(flatten)]
    pub slot: DutySlotEntity,
    pub registered: i64,
}

impl From<DutySlotOccupancyEntity> for SlotOccupancy {
    fn from(entity: DutySlotOccupancyEntity) -> Self {
        Self {
            slot: entity.slot.into(),
            registered: entity.registered,
        }
    }
}

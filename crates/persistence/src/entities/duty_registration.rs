//! Duty registration entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{FamilyAttendanceRecord, Registration};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the duty_registrations table.
#[derive(Debug, Clone, FromRow)]
pub struct DutyRegistrationEntity {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub family_id: Uuid,
    pub checked_in: bool,
    pub check_in_at: Option<DateTime<Utc>>,
    pub checked_out: bool,
    pub check_out_at: Option<DateTime<Utc>>,
    pub actual_minutes: Option<i32>,
    pub no_show: bool,
    pub no_show_marked_by: Option<Uuid>,
    pub swap_offered: bool,
    pub confirmed: bool,
    pub confirmed_by: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DutyRegistrationEntity> for Registration {
    fn from(entity: DutyRegistrationEntity) -> Self {
        Self {
            id: entity.id,
            slot_id: entity.slot_id,
            user_id: entity.user_id,
            user_name: entity.user_name,
            family_id: entity.family_id,
            checked_in: entity.checked_in,
            check_in_at: entity.check_in_at,
            checked_out: entity.checked_out,
            check_out_at: entity.check_out_at,
            actual_minutes: entity.actual_minutes,
            no_show: entity.no_show,
            no_show_marked_by: entity.no_show_marked_by,
            swap_offered: entity.swap_offered,
            confirmed: entity.confirmed,
            confirmed_by: entity.confirmed_by,
            confirmed_at: entity.confirmed_at,
            cancelled_at: entity.cancelled_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Registration joined with the slot columns the hours ledger needs.
#[derive(Debug, Clone, FromRow)]
pub struct FamilyAttendanceEntity {
    #[sqlx(flatten)]
    pub registration: DutyRegistrationEntity,
    pub slot_date: NaiveDate,
    pub scheduled_minutes: i32,
    pub hours_credit: f64,
}

impl From<FamilyAttendanceEntity> for FamilyAttendanceRecord {
    fn from(entity: FamilyAttendanceEntity) -> Self {
        Self {
            registration: entity.registration.into(),
            slot_date: entity.slot_date,
            scheduled_minutes: entity.scheduled_minutes as i64,
            hours_credit: entity.hours_credit,
        }
    }
}

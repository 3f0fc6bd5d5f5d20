//! Slot (dated duty occurrence) domain models.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::duty_config::DutyConfig;

/// Status of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Open,
    Full,
    Completed,
    Cancelled,
}

impl SlotStatus {
    /// Converts to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Open => "open",
            SlotStatus::Full => "full",
            SlotStatus::Completed => "completed",
            SlotStatus::Cancelled => "cancelled",
        }
    }

    /// Parses from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(SlotStatus::Open),
            "full" => Some(SlotStatus::Full),
            "completed" => Some(SlotStatus::Completed),
            "cancelled" => Some(SlotStatus::Cancelled),
            _ => None,
        }
    }

    /// Completed and cancelled slots no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotStatus::Completed | SlotStatus::Cancelled)
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A concrete dated occurrence of a duty template.
///
/// Capacity, time window and credit are copied from the template when the
/// slot is generated; later template edits do not reach existing slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Slot {
    pub id: Uuid,
    pub config_id: Uuid,
    pub section_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub min_participants: i32,
    pub max_participants: i32,
    pub hours_credit: f64,
    pub status: SlotStatus,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing)]
    pub qr_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    /// Scheduled duration in minutes.
    pub fn scheduled_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes().max(0)
    }

    /// Start instant, interpreting the local date and time in `offset`.
    pub fn starts_at(&self, offset: FixedOffset) -> DateTime<Utc> {
        local_instant(self.slot_date.and_time(self.start_time), offset)
    }

    /// End instant, interpreting the local date and time in `offset`.
    pub fn ends_at(&self, offset: FixedOffset) -> DateTime<Utc> {
        local_instant(self.slot_date.and_time(self.end_time), offset)
    }

    pub fn has_ended(&self, now: DateTime<Utc>, offset: FixedOffset) -> bool {
        now >= self.ends_at(offset)
    }
}

fn local_instant(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    // A fixed offset has no gaps or folds, so the mapping is always unique.
    match offset.from_local_datetime(&local) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        _ => Utc.from_utc_datetime(&local),
    }
}

/// A slot ready to be inserted, built from a template at generation time.
#[derive(Debug, Clone)]
pub struct NewSlot {
    pub config_id: Uuid,
    pub section_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub min_participants: i32,
    pub max_participants: i32,
    pub hours_credit: f64,
    pub qr_token: String,
}

impl NewSlot {
    /// Snapshot the template's window, capacity and credit for `date`.
    pub fn from_config(config: &DutyConfig, date: NaiveDate, qr_token: String) -> Self {
        Self {
            config_id: config.id,
            section_id: config.section_id,
            slot_date: date,
            start_time: config.start_time,
            end_time: config.end_time,
            min_participants: config.min_participants,
            max_participants: config.max_participants,
            hours_credit: config.hours_credit,
            qr_token,
        }
    }
}

/// A slot together with its current number of active registrations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SlotOccupancy {
    #[serde(flatten)]
    pub slot: Slot,
    pub registered: i64,
}

impl SlotOccupancy {
    pub fn open_spots(&self) -> i64 {
        (self.slot.max_participants as i64 - self.registered).max(0)
    }

    /// Whether the slot is still short of its minimum staffing.
    pub fn needs_participants(&self) -> bool {
        !self.slot.status.is_terminal() && self.registered < self.slot.min_participants as i64
    }
}

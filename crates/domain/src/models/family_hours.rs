//! Family hours ledger models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::registration::Registration;

/// Traffic-light classification of a family's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyHoursStatus {
    Completed,
    OnTrack,
    AtRisk,
    Behind,
}

impl std::fmt::Display for FamilyHoursStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FamilyHoursStatus::Completed => write!(f, "completed"),
            FamilyHoursStatus::OnTrack => write!(f, "on_track"),
            FamilyHoursStatus::AtRisk => write!(f, "at_risk"),
            FamilyHoursStatus::Behind => write!(f, "behind"),
        }
    }
}

/// Aggregated obligation report for one family over a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FamilyHoursSummary {
    pub family_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub target_hours: f64,
    /// Confirmed cleaning credit plus confirmed job hours.
    pub completed_hours: f64,
    /// Checked out but not yet confirmed; not counted toward the target.
    pub pending_hours: f64,
    pub cleaning_hours: f64,
    pub job_hours: f64,
    pub remaining_hours: f64,
    pub status: FamilyHoursStatus,
}

/// A family's registration joined with the slot data the ledger needs.
#[derive(Debug, Clone)]
pub struct FamilyAttendanceRecord {
    pub registration: Registration,
    pub slot_date: NaiveDate,
    pub scheduled_minutes: i64,
    pub hours_credit: f64,
}

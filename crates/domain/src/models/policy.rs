//! Tunable policies for crediting time and classifying family progress.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use super::family_hours::FamilyHoursStatus;

/// How a confirmed registration is turned into credited hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditPolicy {
    /// The slot's full `hours_credit` per confirmed registration.
    #[default]
    Flat,
    /// `hours_credit` scaled by actual over scheduled minutes, capped at 1.
    Prorated,
}

impl CreditPolicy {
    pub fn credited_hours(&self, hours_credit: f64, actual_minutes: i32, scheduled_minutes: i64) -> f64 {
        match self {
            CreditPolicy::Flat => hours_credit,
            CreditPolicy::Prorated => {
                if scheduled_minutes <= 0 {
                    return hours_credit;
                }
                let ratio = (actual_minutes.max(0) as f64 / scheduled_minutes as f64).min(1.0);
                hours_credit * ratio
            }
        }
    }
}

/// Completed/target ratio boundaries for the family traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StatusThresholds {
    #[serde(default = "default_on_track_ratio")]
    pub on_track_ratio: f64,
    #[serde(default = "default_at_risk_ratio")]
    pub at_risk_ratio: f64,
}

fn default_on_track_ratio() -> f64 {
    0.75
}

fn default_at_risk_ratio() -> f64 {
    0.4
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            on_track_ratio: default_on_track_ratio(),
            at_risk_ratio: default_at_risk_ratio(),
        }
    }
}

impl StatusThresholds {
    pub fn is_consistent(&self) -> bool {
        (0.0..=1.0).contains(&self.at_risk_ratio)
            && (0.0..=1.0).contains(&self.on_track_ratio)
            && self.at_risk_ratio <= self.on_track_ratio
    }

    pub fn classify(&self, completed_hours: f64, target_hours: f64) -> FamilyHoursStatus {
        if target_hours <= 0.0 {
            return FamilyHoursStatus::Completed;
        }
        let ratio = completed_hours / target_hours;
        if ratio >= 1.0 {
            FamilyHoursStatus::Completed
        } else if ratio >= self.on_track_ratio {
            FamilyHoursStatus::OnTrack
        } else if ratio >= self.at_risk_ratio {
            FamilyHoursStatus::AtRisk
        } else {
            FamilyHoursStatus::Behind
        }
    }
}

/// Settings shared by the duty services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DutySettings {
    /// Offset of the school's local time from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// How early before the slot start a check-in token is accepted.
    #[serde(default = "default_check_in_lead_minutes")]
    pub check_in_lead_minutes: i64,

    /// Extra minutes beyond the scheduled duration that can be credited.
    #[serde(default = "default_checkout_grace_minutes")]
    pub checkout_grace_minutes: i64,

    /// Largest date range accepted by generation and ledger queries.
    #[serde(default = "default_max_range_days")]
    pub max_range_days: i64,

    #[serde(default)]
    pub credit_policy: CreditPolicy,

    /// Yearly obligation per family.
    #[serde(default = "default_target_hours")]
    pub target_hours: f64,

    #[serde(default)]
    pub thresholds: StatusThresholds,

    /// Flag registrations that never checked in when a slot is completed.
    #[serde(default)]
    pub auto_flag_no_shows: bool,
}

fn default_check_in_lead_minutes() -> i64 {
    30
}

fn default_checkout_grace_minutes() -> i64 {
    30
}

fn default_max_range_days() -> i64 {
    400
}

fn default_target_hours() -> f64 {
    20.0
}

impl Default for DutySettings {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            check_in_lead_minutes: default_check_in_lead_minutes(),
            checkout_grace_minutes: default_checkout_grace_minutes(),
            max_range_days: default_max_range_days(),
            credit_policy: CreditPolicy::default(),
            target_hours: default_target_hours(),
            thresholds: StatusThresholds::default(),
            auto_flag_no_shows: false,
        }
    }
}

impl DutySettings {
    /// Local time offset; out-of-range values fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        self.checked_offset().unwrap_or_else(|| Utc.fix())
    }

    pub fn has_valid_offset(&self) -> bool {
        self.checked_offset().is_some()
    }

    fn checked_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }
}

//! Duty template domain models.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::DutyError;

/// When a duty template produces occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "on")]
pub enum DutySchedule {
    /// Every week on the given weekday.
    Weekly(Weekday),
    /// Once, on a specific date (event-style duty).
    OneOff(NaiveDate),
}

impl DutySchedule {
    pub fn is_one_off(&self) -> bool {
        matches!(self, DutySchedule::OneOff(_))
    }

    /// Weekday as stored (ISO numbering, Monday = 1).
    pub fn day_of_week(&self) -> Option<i16> {
        match self {
            DutySchedule::Weekly(day) => Some(day.number_from_monday() as i16),
            DutySchedule::OneOff(_) => None,
        }
    }

    pub fn specific_date(&self) -> Option<NaiveDate> {
        match self {
            DutySchedule::Weekly(_) => None,
            DutySchedule::OneOff(date) => Some(*date),
        }
    }

    /// Rebuild from the stored columns. Exactly one of the two must be set.
    pub fn from_parts(day_of_week: Option<i16>, specific_date: Option<NaiveDate>) -> Option<Self> {
        match (day_of_week, specific_date) {
            (None, Some(date)) => Some(DutySchedule::OneOff(date)),
            (Some(n), None) => weekday_from_iso(n).map(DutySchedule::Weekly),
            _ => None,
        }
    }
}

fn weekday_from_iso(n: i16) -> Option<Weekday> {
    match n {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// A recurring (or one-off) cleaning duty template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DutyConfig {
    pub id: Uuid,
    pub section_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<Uuid>,
    pub title: String,
    pub schedule: DutySchedule,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub min_participants: i32,
    pub max_participants: i32,
    pub hours_credit: f64,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_event_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request payload for creating a duty template.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
#[validate(schema(function = "validate_create_config", skip_on_field_errors = false))]
pub struct CreateDutyConfigRequest {
    pub section_id: Uuid,

    #[serde(default)]
    pub room_id: Option<Uuid>,

    #[validate(length(min = 1, max = 120, message = "Title must be 1-120 characters"))]
    pub title: String,

    #[serde(default)]
    pub day_of_week: Option<Weekday>,

    #[serde(default)]
    pub specific_date: Option<NaiveDate>,

    pub start_time: NaiveTime,
    pub end_time: NaiveTime,

    #[validate(range(min = 0, max = 100, message = "Minimum participants must be between 0 and 100"))]
    pub min_participants: i32,

    #[validate(range(min = 1, max = 100, message = "Maximum participants must be between 1 and 100"))]
    pub max_participants: i32,

    #[validate(custom(function = "shared::validation::validate_hours_credit"))]
    pub hours_credit: f64,

    #[serde(default)]
    pub calendar_event_id: Option<Uuid>,
}

fn validate_create_config(req: &CreateDutyConfigRequest) -> Result<(), ValidationError> {
    if req.day_of_week.is_some() == req.specific_date.is_some() {
        let mut err = ValidationError::new("schedule");
        err.message = Some("Exactly one of day_of_week or specific_date must be set".into());
        return Err(err);
    }
    shared::validation::validate_time_window(req.start_time, req.end_time)?;
    shared::validation::validate_capacity(req.min_participants, req.max_participants)
}

impl CreateDutyConfigRequest {
    /// Validate and convert into the insert shape.
    pub fn into_new_config(self, created_by: Uuid) -> Result<NewDutyConfig, DutyError> {
        self.validate()?;
        let schedule = DutySchedule::from_parts(
            self.day_of_week.map(|d| d.number_from_monday() as i16),
            self.specific_date,
        )
        .ok_or_else(|| {
            DutyError::Validation("Exactly one of day_of_week or specific_date must be set".into())
        })?;

        Ok(NewDutyConfig {
            section_id: self.section_id,
            room_id: self.room_id,
            title: self.title.trim().to_string(),
            schedule,
            start_time: self.start_time,
            end_time: self.end_time,
            min_participants: self.min_participants,
            max_participants: self.max_participants,
            hours_credit: self.hours_credit,
            calendar_event_id: self.calendar_event_id,
            created_by,
        })
    }
}

/// Validated template ready to be stored.
#[derive(Debug, Clone)]
pub struct NewDutyConfig {
    pub section_id: Uuid,
    pub room_id: Option<Uuid>,
    pub title: String,
    pub schedule: DutySchedule,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub min_participants: i32,
    pub max_participants: i32,
    pub hours_credit: f64,
    pub calendar_event_id: Option<Uuid>,
    pub created_by: Uuid,
}

/// Request payload for editing a template (partial update).
///
/// Edits only affect slots generated afterwards.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateDutyConfigRequest {
    #[validate(length(min = 1, max = 120, message = "Title must be 1-120 characters"))]
    pub title: Option<String>,

    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,

    #[validate(range(min = 0, max = 100, message = "Minimum participants must be between 0 and 100"))]
    pub min_participants: Option<i32>,

    #[validate(range(min = 1, max = 100, message = "Maximum participants must be between 1 and 100"))]
    pub max_participants: Option<i32>,

    #[validate(custom(function = "shared::validation::validate_hours_credit"))]
    pub hours_credit: Option<f64>,
}

impl UpdateDutyConfigRequest {
    /// Apply the update to an existing template, re-checking cross-field rules.
    pub fn apply_to(&self, config: &DutyConfig) -> Result<DutyConfig, DutyError> {
        self.validate()?;

        let mut updated = config.clone();
        if let Some(title) = &self.title {
            updated.title = title.trim().to_string();
        }
        if let Some(start) = self.start_time {
            updated.start_time = start;
        }
        if let Some(end) = self.end_time {
            updated.end_time = end;
        }
        if let Some(min) = self.min_participants {
            updated.min_participants = min;
        }
        if let Some(max) = self.max_participants {
            updated.max_participants = max;
        }
        if let Some(credit) = self.hours_credit {
            updated.hours_credit = credit;
        }

        let to_validation = |e: ValidationError| {
            DutyError::Validation(e.message.map(|m| m.to_string()).unwrap_or_default())
        };
        shared::validation::validate_time_window(updated.start_time, updated.end_time)
            .map_err(to_validation)?;
        shared::validation::validate_capacity(updated.min_participants, updated.max_participants)
            .map_err(to_validation)?;

        Ok(updated)
    }
}

//! Common validation utilities.

use chrono::{NaiveDate, NaiveTime};
use validator::ValidationError;

/// Upper bound for a single slot's participant capacity.
pub const MAX_SLOT_CAPACITY: i32 = 100;

/// Upper bound for the hours credited by a single slot.
pub const MAX_HOURS_CREDIT: f64 = 24.0;

/// Validates that a time window ends strictly after it starts.
pub fn validate_time_window(start: NaiveTime, end: NaiveTime) -> Result<(), ValidationError> {
    if end > start {
        Ok(())
    } else {
        let mut err = ValidationError::new("time_window");
        err.message = Some("End time must be after start time".into());
        Err(err)
    }
}

/// Validates that the minimum participant count does not exceed the maximum.
pub fn validate_capacity(min: i32, max: i32) -> Result<(), ValidationError> {
    if max < 1 {
        let mut err = ValidationError::new("capacity_positive");
        err.message = Some("Maximum participants must be positive".into());
        return Err(err);
    }
    if min < 0 || min > max {
        let mut err = ValidationError::new("capacity_range");
        err.message = Some("Minimum participants must be between 0 and the maximum".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that an hours credit value is finite and within range.
pub fn validate_hours_credit(hours: f64) -> Result<(), ValidationError> {
    if hours.is_finite() && (0.0..=MAX_HOURS_CREDIT).contains(&hours) {
        Ok(())
    } else {
        let mut err = ValidationError::new("hours_credit_range");
        err.message = Some("Hours credit must be between 0 and 24".into());
        Err(err)
    }
}

/// Validates a half-open date range `[from, to)` against a maximum span.
pub fn validate_date_range(
    from: NaiveDate,
    to: NaiveDate,
    max_days: i64,
) -> Result<(), ValidationError> {
    if from > to {
        let mut err = ValidationError::new("date_range_order");
        err.message = Some("Range start must not be after range end".into());
        return Err(err);
    }
    if (to - from).num_days() > max_days {
        let mut err = ValidationError::new("date_range_span");
        err.message = Some(format!("Range cannot span more than {} days", max_days).into());
        return Err(err);
    }
    Ok(())
}

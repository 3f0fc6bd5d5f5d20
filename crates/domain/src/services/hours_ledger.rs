//! Per-family aggregation of credited hours against the yearly target.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::job_hours::JobHoursSource;
use super::store::DutyStore;
use crate::error::DutyError;
use crate::models::{DateRange, DutySettings, FamilyAttendanceRecord, FamilyHoursSummary};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Confirmed cleaning credit and pending (unconfirmed) hours over `records`.
pub fn tally_cleaning_hours(records: &[FamilyAttendanceRecord], settings: &DutySettings) -> (f64, f64) {
    records.iter().fold((0.0, 0.0), |(credited, pending), record| {
        let registration = &record.registration;
        if registration.is_creditable() {
            let hours = settings.credit_policy.credited_hours(
                record.hours_credit,
                registration.actual_minutes.unwrap_or(0),
                record.scheduled_minutes,
            );
            (credited + hours, pending)
        } else if registration.is_pending_confirmation() {
            let minutes = registration.actual_minutes.unwrap_or(0).max(0);
            (credited, pending + minutes as f64 / 60.0)
        } else {
            (credited, pending)
        }
    })
}

pub struct HoursLedger {
    store: Arc<dyn DutyStore>,
    job_hours: Arc<dyn JobHoursSource>,
    settings: DutySettings,
}

impl HoursLedger {
    pub fn new(
        store: Arc<dyn DutyStore>,
        job_hours: Arc<dyn JobHoursSource>,
        settings: DutySettings,
    ) -> Self {
        Self {
            store,
            job_hours,
            settings,
        }
    }

    /// Summarize a family's progress over `range`.
    pub async fn get_family_hours(
        &self,
        family_id: Uuid,
        range: DateRange,
    ) -> Result<FamilyHoursSummary, DutyError> {
        let range = DateRange::new(range.from, range.to, self.settings.max_range_days)?;

        let records = self.store.list_family_attendance(family_id, range).await?;
        let (cleaning_hours, pending_hours) = tally_cleaning_hours(&records, &self.settings);
        let job_hours = self
            .job_hours
            .confirmed_job_hours(family_id, range)
            .await?
            .max(0.0);

        let target_hours = self.settings.target_hours;
        let completed_hours = cleaning_hours + job_hours;
        let remaining_hours = (target_hours - completed_hours).max(0.0);
        let status = self.settings.thresholds.classify(completed_hours, target_hours);

        debug!(
            family_id = %family_id,
            registrations = records.len(),
            completed_hours = completed_hours,
            status = %status,
            "Family hours computed"
        );

        Ok(FamilyHoursSummary {
            family_id,
            from: range.from,
            to: range.to,
            target_hours: round2(target_hours),
            completed_hours: round2(completed_hours),
            pending_hours: round2(pending_hours),
            cleaning_hours: round2(cleaning_hours),
            job_hours: round2(job_hours),
            remaining_hours: round2(remaining_hours),
            status,
        })
    }
}

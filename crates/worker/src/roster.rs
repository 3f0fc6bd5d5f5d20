//! Wiring of the duty services over one store and clock.

use std::sync::Arc;

use domain::models::DutySettings;
use domain::services::{
    AttendanceTracker, Clock, DutyConfigService, DutyEventPublisher, DutyStore, HoursLedger,
    JobHoursSource, OutboxDispatcher, RegistrationManager, ScheduleExpander, SlotLifecycleManager,
};

/// Every duty service, sharing the same store, clock and settings.
///
/// Cheap to clone; hosts embedding the roster hand clones to their request
/// handlers while the worker's jobs hold the expander, lifecycle and
/// dispatcher.
#[derive(Clone)]
pub struct DutyRoster {
    pub configs: Arc<DutyConfigService>,
    pub expander: Arc<ScheduleExpander>,
    pub lifecycle: Arc<SlotLifecycleManager>,
    pub registrations: Arc<RegistrationManager>,
    pub attendance: Arc<AttendanceTracker>,
    pub ledger: Arc<HoursLedger>,
    pub dispatcher: Arc<OutboxDispatcher>,
}

impl DutyRoster {
    pub fn new(
        store: Arc<dyn DutyStore>,
        clock: Arc<dyn Clock>,
        settings: DutySettings,
        events: Arc<dyn DutyEventPublisher>,
        job_hours: Arc<dyn JobHoursSource>,
    ) -> Self {
        Self {
            configs: Arc::new(DutyConfigService::new(
                Arc::clone(&store),
                Arc::clone(&clock),
            )),
            expander: Arc::new(ScheduleExpander::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                settings.clone(),
            )),
            lifecycle: Arc::new(SlotLifecycleManager::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                settings.clone(),
            )),
            registrations: Arc::new(RegistrationManager::new(
                Arc::clone(&store),
                Arc::clone(&clock),
            )),
            attendance: Arc::new(AttendanceTracker::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                settings.clone(),
            )),
            ledger: Arc::new(HoursLedger::new(Arc::clone(&store), job_hours, settings)),
            dispatcher: Arc::new(OutboxDispatcher::new(store, events, clock)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
    use domain::models::{CreateDutyConfigRequest, DateRange, FamilyHoursStatus};
    use domain::services::{ChannelEventPublisher, FixedJobHours, InMemoryDutyStore, ManualClock};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_one_off_duty_end_to_end() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap()));
        let (publisher, mut events) = ChannelEventPublisher::channel();
        let family_id = Uuid::new_v4();
        let roster = DutyRoster::new(
            Arc::new(InMemoryDutyStore::new()),
            clock.clone(),
            DutySettings::default(),
            Arc::new(publisher),
            Arc::new(FixedJobHours::new().with_family(family_id, 1.5)),
        );

        let on = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let config = roster
            .configs
            .create_config(
                CreateDutyConfigRequest {
                    section_id: Uuid::new_v4(),
                    room_id: None,
                    title: "Summer fair cleanup".to_string(),
                    day_of_week: None,
                    specific_date: Some(on),
                    start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                    min_participants: 1,
                    max_participants: 4,
                    hours_credit: 3.0,
                    calendar_event_id: None,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        assert!(events.try_recv().is_err());
        let dispatched = roster.dispatcher.dispatch_pending(10).await.unwrap();
        assert_eq!(dispatched.delivered, 1);
        let event = events.recv().await.unwrap();
        assert_eq!(event.aggregate_id(), config.id);

        let report = roster.expander.generate_upcoming(7).await.unwrap();
        assert_eq!(report.slots_created, 1);

        let slot = roster
            .lifecycle
            .upcoming_slots(None, 10)
            .await
            .unwrap()
            .remove(0);
        let slot = roster.lifecycle.rotate_check_in_token(slot.slot.id).await.unwrap();
        let token = slot.qr_token.clone();

        let user_id = Uuid::new_v4();
        let registration = roster
            .registrations
            .register(slot.id, user_id, "Robin Parent", family_id)
            .await
            .unwrap();

        clock.set(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap());
        roster.attendance.check_in(slot.id, user_id, &token).await.unwrap();
        clock.advance(Duration::hours(3));
        roster.attendance.check_out(slot.id, user_id).await.unwrap();
        roster
            .attendance
            .confirm(registration.id, Uuid::new_v4())
            .await
            .unwrap();

        let summary = roster
            .ledger
            .get_family_hours(family_id, DateRange::starting_at(on, 1))
            .await
            .unwrap();
        assert_eq!(summary.cleaning_hours, 3.0);
        assert_eq!(summary.job_hours, 1.5);
        assert_eq!(summary.completed_hours, 4.5);
        assert_eq!(summary.status, FamilyHoursStatus::Behind);
    }
}

//! Common test utilities for duty roster integration tests.
//!
//! Every test drives the services against `InMemoryDutyStore` with a
//! `ManualClock`, so no database is needed.

// Helpers are shared by several test binaries; not all of them use every one.
#![allow(dead_code)]

pub mod failing_store;

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use domain::models::{
    CreateDutyConfigRequest, DateRange, DutyConfig, DutySettings, Registration, Slot,
};
use domain::services::{
    AttendanceTracker, ChannelEventPublisher, DutyConfigService, DutyEvent, FixedJobHours,
    HoursLedger, InMemoryDutyStore, ManualClock, OutboxDispatcher, RegistrationManager,
    ScheduleExpander, SlotLifecycleManager,
};
use fake::faker::name::en::Name;
use fake::Fake;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn range(from: NaiveDate, to: NaiveDate) -> DateRange {
    DateRange { from, to }
}

/// A weekly template request.
pub fn weekly_request(
    weekday: Weekday,
    start: NaiveTime,
    end: NaiveTime,
    min: i32,
    max: i32,
    hours_credit: f64,
) -> CreateDutyConfigRequest {
    CreateDutyConfigRequest {
        section_id: Uuid::new_v4(),
        room_id: None,
        title: "Classroom cleaning".to_string(),
        day_of_week: Some(weekday),
        specific_date: None,
        start_time: start,
        end_time: end,
        min_participants: min,
        max_participants: max,
        hours_credit,
        calendar_event_id: None,
    }
}

/// A one-off template request tied to a calendar event.
pub fn one_off_request(on: NaiveDate, start: NaiveTime, end: NaiveTime) -> CreateDutyConfigRequest {
    CreateDutyConfigRequest {
        section_id: Uuid::new_v4(),
        room_id: Some(Uuid::new_v4()),
        title: "Summer fair cleanup".to_string(),
        day_of_week: None,
        specific_date: Some(on),
        start_time: start,
        end_time: end,
        min_participants: 2,
        max_participants: 6,
        hours_credit: 3.0,
        calendar_event_id: Some(Uuid::new_v4()),
    }
}

/// A parent with a generated display name.
#[derive(Debug, Clone)]
pub struct TestParent {
    pub user_id: Uuid,
    pub family_id: Uuid,
    pub name: String,
}

impl TestParent {
    pub fn new() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            family_id: Uuid::new_v4(),
            name: Name().fake(),
        }
    }

    /// Another parent in the same family.
    pub fn partner(&self) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            family_id: self.family_id,
            name: Name().fake(),
        }
    }
}

impl Default for TestParent {
    fn default() -> Self {
        Self::new()
    }
}

/// All services wired to one in-memory store and one manual clock.
pub struct TestRoster {
    pub store: Arc<InMemoryDutyStore>,
    pub clock: Arc<ManualClock>,
    pub settings: DutySettings,
    pub configs: DutyConfigService,
    pub expander: ScheduleExpander,
    pub lifecycle: SlotLifecycleManager,
    pub registrations: RegistrationManager,
    pub attendance: AttendanceTracker,
    pub ledger: HoursLedger,
    pub dispatcher: OutboxDispatcher,
    /// Receives what `dispatcher` publishes.
    pub events: UnboundedReceiver<DutyEvent>,
}

impl TestRoster {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_settings(now, DutySettings::default(), FixedJobHours::new())
    }

    pub fn with_settings(
        now: DateTime<Utc>,
        settings: DutySettings,
        job_hours: FixedJobHours,
    ) -> Self {
        let store = Arc::new(InMemoryDutyStore::new());
        let clock = Arc::new(ManualClock::new(now));
        let (publisher, events) = ChannelEventPublisher::channel();

        Self {
            configs: DutyConfigService::new(store.clone(), clock.clone()),
            expander: ScheduleExpander::new(store.clone(), clock.clone(), settings.clone()),
            lifecycle: SlotLifecycleManager::new(store.clone(), clock.clone(), settings.clone()),
            registrations: RegistrationManager::new(store.clone(), clock.clone()),
            attendance: AttendanceTracker::new(store.clone(), clock.clone(), settings.clone()),
            ledger: HoursLedger::new(store.clone(), Arc::new(job_hours), settings.clone()),
            dispatcher: OutboxDispatcher::new(store.clone(), Arc::new(publisher), clock.clone()),
            store,
            clock,
            settings,
            events,
        }
    }

    /// Create a template and return it.
    pub async fn create_config(&self, request: CreateDutyConfigRequest) -> DutyConfig {
        self.configs
            .create_config(request, Uuid::new_v4())
            .await
            .expect("Failed to create duty config")
    }

    /// Create a weekly template and materialize its single slot on `on`.
    pub async fn single_slot(
        &self,
        on: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        min: i32,
        max: i32,
        hours_credit: f64,
    ) -> Slot {
        let config = self
            .create_config(weekly_request(on.weekday(), start, end, min, max, hours_credit))
            .await;
        let mut slots = self
            .expander
            .generate_slots(config.id, range(on, on.succ_opt().unwrap()))
            .await
            .expect("Failed to generate slot");
        assert_eq!(slots.len(), 1);
        slots.remove(0)
    }

    pub async fn register(&self, slot: &Slot, parent: &TestParent) -> Registration {
        self.registrations
            .register(slot.id, parent.user_id, &parent.name, parent.family_id)
            .await
            .expect("Failed to register")
    }

    /// Register, check in at `check_in`, check out at `check_out` and confirm.
    pub async fn attend(
        &self,
        slot: &Slot,
        parent: &TestParent,
        check_in: DateTime<Utc>,
        check_out: DateTime<Utc>,
        confirm: bool,
    ) -> Registration {
        self.register(slot, parent).await;
        self.clock.set(check_in);
        self.attendance
            .check_in(slot.id, parent.user_id, &slot.qr_token)
            .await
            .expect("Failed to check in");
        self.clock.set(check_out);
        let registration = self
            .attendance
            .check_out(slot.id, parent.user_id)
            .await
            .expect("Failed to check out");
        if confirm {
            self.attendance
                .confirm(registration.id, Uuid::new_v4())
                .await
                .expect("Failed to confirm")
        } else {
            registration
        }
    }
}

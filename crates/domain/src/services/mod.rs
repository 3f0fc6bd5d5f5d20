//! Domain services for the duty roster.
//!
//! Services hold business rules and talk to storage only through
//! [`DutyStore`]. Timestamps come from the injected [`Clock`].

pub mod attendance;
pub mod clock;
pub mod duty_config;
pub mod events;
pub mod hours_ledger;
pub mod job_hours;
pub mod memory_store;
pub mod outbox;
pub mod registration;
pub mod schedule_expander;
pub mod slot_lifecycle;
pub mod store;

pub use attendance::{compute_actual_minutes, AttendanceTracker};
pub use clock::{Clock, ManualClock, SystemClock};
pub use duty_config::DutyConfigService;
pub use events::{
    ChannelEventPublisher, DutyEvent, DutyEventPublisher, LoggingEventPublisher, OneOffDutyCreated,
    OutboxEvent, PublishError,
};
pub use hours_ledger::HoursLedger;
pub use job_hours::{FixedJobHours, JobHoursSource};
pub use memory_store::InMemoryDutyStore;
pub use outbox::{DispatchReport, OutboxDispatcher};
pub use registration::RegistrationManager;
pub use schedule_expander::{occurrence_dates, GenerationReport, ScheduleExpander};
pub use slot_lifecycle::{ReconciliationReport, SlotLifecycle, SlotLifecycleManager};
pub use store::{ClaimOutcome, DutyStore, ReleaseOutcome};

//! Domain models for the duty roster.

pub mod date_range;
pub mod duty_config;
pub mod family_hours;
pub mod policy;
pub mod registration;
pub mod slot;

pub use date_range::DateRange;
pub use duty_config::{
    CreateDutyConfigRequest, DutyConfig, DutySchedule, NewDutyConfig, UpdateDutyConfigRequest,
};
pub use family_hours::{FamilyAttendanceRecord, FamilyHoursStatus, FamilyHoursSummary};
pub use policy::{CreditPolicy, DutySettings, StatusThresholds};
pub use registration::{NewRegistration, Registration, Transferee};
pub use slot::{NewSlot, Slot, SlotOccupancy, SlotStatus};

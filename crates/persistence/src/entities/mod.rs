//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod duty_config;
pub mod duty_event;
pub mod duty_registration;
pub mod duty_slot;

pub use duty_config::DutyConfigEntity;
pub use duty_event::DutyEventEntity;
pub use duty_registration::{DutyRegistrationEntity, FamilyAttendanceEntity};
pub use duty_slot::{DutySlotEntity, DutySlotOccupancyEntity, SlotStatusDb};

//! Repository implementations for database operations.

pub mod duty_config;
pub mod duty_event_outbox;
pub mod duty_registration;
pub mod duty_slot;

pub use duty_config::DutyConfigRepository;
pub use duty_event_outbox::DutyEventOutboxRepository;
pub use duty_registration::DutyRegistrationRepository;
pub use duty_slot::DutySlotRepository;

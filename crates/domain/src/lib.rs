//! Domain layer for the cleaning-duty roster.
//!
//! This crate contains:
//! - Domain models (DutyConfig, Slot, Registration, FamilyHoursSummary)
//! - The scheduling, registration, attendance and ledger services
//! - The storage port and an in-memory implementation
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;

pub use error::DutyError;

//! Duty roster worker.
//!
//! Hosts the background side of the duty roster: rolling slot generation,
//! slot reconciliation and delivery of queued duty events. [`roster::DutyRoster`]
//! wires the domain services for hosts that embed them.

pub mod config;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod roster;

//! Outbound duty events.
//!
//! Events are written to the store's outbox in the same unit of work as the
//! change they describe, then handed to a [`DutyEventPublisher`] by the
//! [`OutboxDispatcher`](super::outbox::OutboxDispatcher). Delivery is
//! at-least-once: consumers dedupe on [`DutyEvent::aggregate_id`].

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{DutyConfig, DutySchedule};

/// Payload emitted when a one-off duty template is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneOffDutyCreated {
    pub config_id: Uuid,
    pub section_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<Uuid>,
    pub title: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub min_participants: i32,
    pub max_participants: i32,
    pub hours_credit: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_event_id: Option<Uuid>,
    pub created_by: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl OneOffDutyCreated {
    /// Build the payload for a one-off template; `None` for weekly ones.
    pub fn from_config(config: &DutyConfig, occurred_at: DateTime<Utc>) -> Option<Self> {
        let DutySchedule::OneOff(date) = config.schedule else {
            return None;
        };
        Some(Self {
            config_id: config.id,
            section_id: config.section_id,
            room_id: config.room_id,
            title: config.title.clone(),
            date,
            start_time: config.start_time,
            end_time: config.end_time,
            min_participants: config.min_participants,
            max_participants: config.max_participants,
            hours_credit: config.hours_credit,
            calendar_event_id: config.calendar_event_id,
            created_by: config.created_by,
            occurred_at,
        })
    }
}

/// Events exposed to other subsystems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DutyEvent {
    OneOffDutyCreated(OneOffDutyCreated),
}

impl DutyEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DutyEvent::OneOffDutyCreated(_) => "one_off_duty_created",
        }
    }

    /// Identifier of the entity the event is about.
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            DutyEvent::OneOffDutyCreated(e) => e.config_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DutyEvent::OneOffDutyCreated(e) => e.occurred_at,
        }
    }

    /// The event a freshly stored template announces, if any.
    pub fn for_new_config(config: &DutyConfig, now: DateTime<Utc>) -> Option<Self> {
        OneOffDutyCreated::from_config(config, now).map(DutyEvent::OneOffDutyCreated)
    }
}

/// An event waiting in the outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub event: DutyEvent,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Event consumer is unavailable")]
    Unavailable,

    #[error("Event rejected: {0}")]
    Rejected(String),
}

/// Outbound event interface.
pub trait DutyEventPublisher: Send + Sync {
    /// Hand the event to the consumer. Must not block. An error leaves the
    /// event pending in the outbox.
    fn publish(&self, event: &DutyEvent) -> Result<(), PublishError>;
}

/// Publisher backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelEventPublisher {
    tx: mpsc::UnboundedSender<DutyEvent>,
}

impl ChannelEventPublisher {
    /// Create a publisher and the receiving end its consumer drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DutyEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DutyEventPublisher for ChannelEventPublisher {
    fn publish(&self, event: &DutyEvent) -> Result<(), PublishError> {
        self.tx
            .send(event.clone())
            .map_err(|_| PublishError::Unavailable)
    }
}

/// Publisher that only logs, for deployments without a consumer.
#[derive(Debug, Clone, Default)]
pub struct LoggingEventPublisher;

impl DutyEventPublisher for LoggingEventPublisher {
    fn publish(&self, event: &DutyEvent) -> Result<(), PublishError> {
        tracing::info!(
            event_type = event.event_type(),
            aggregate_id = %event.aggregate_id(),
            "Duty event emitted without consumer"
        );
        Ok(())
    }
}

//! Storage port for the duty roster.
//!
//! Operations that must be serialized (claiming and releasing a spot) are
//! exposed as single store calls so each implementation can make them atomic.
//! Attendance and admin mutations are conditional updates: they return `None`
//! when the precondition no longer holds, and the caller re-reads to classify.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::events::OutboxEvent;
use crate::error::DutyError;
use crate::models::{
    DateRange, DutyConfig, FamilyAttendanceRecord, NewDutyConfig, NewRegistration, NewSlot,
    Registration, Slot, SlotOccupancy, SlotStatus, Transferee,
};

/// Result of an attempt to claim a spot on a slot.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Claimed {
        registration: Registration,
        slot_status: SlotStatus,
    },
    SlotNotFound,
    /// The slot is cancelled or completed.
    SlotClosed(SlotStatus),
    AlreadyRegistered,
    Full,
}

/// Result of an attempt to give a spot back.
#[derive(Debug, Clone)]
pub enum ReleaseOutcome {
    Released {
        registration: Registration,
        slot_status: SlotStatus,
    },
    SlotNotFound,
    SlotClosed(SlotStatus),
    NotRegistered,
    CheckedIn,
}

#[async_trait::async_trait]
pub trait DutyStore: Send + Sync {
    // Templates

    /// Store a template. The event it announces, if any (see
    /// [`DutyEvent::for_new_config`](super::events::DutyEvent::for_new_config)),
    /// is written to the outbox in the same unit of work.
    async fn insert_config(
        &self,
        config: NewDutyConfig,
        now: DateTime<Utc>,
    ) -> Result<DutyConfig, DutyError>;

    async fn find_config(&self, id: Uuid) -> Result<Option<DutyConfig>, DutyError>;

    /// Persist edited title, window, capacity and credit.
    async fn update_config(
        &self,
        config: &DutyConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyConfig>, DutyError>;

    async fn set_config_active(
        &self,
        id: Uuid,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<DutyConfig>, DutyError>;

    async fn list_active_configs(&self) -> Result<Vec<DutyConfig>, DutyError>;

    // Slots

    /// Insert unless a slot for `(config_id, slot_date)` already exists.
    async fn insert_slot_if_absent(
        &self,
        slot: NewSlot,
        now: DateTime<Utc>,
    ) -> Result<Option<Slot>, DutyError>;

    async fn find_slot(&self, id: Uuid) -> Result<Option<Slot>, DutyError>;

    /// Slots dated within `range`, with active registration counts, ordered
    /// by date and start time.
    async fn list_slots(
        &self,
        range: DateRange,
        section_id: Option<Uuid>,
    ) -> Result<Vec<SlotOccupancy>, DutyError>;

    /// Open or full slots dated on or before `through`.
    async fn list_unfinished_slots(&self, through: NaiveDate) -> Result<Vec<Slot>, DutyError>;

    /// Open/full → cancelled.
    async fn cancel_slot(
        &self,
        id: Uuid,
        cancelled_by: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Slot>, DutyError>;

    /// Open/full → completed.
    async fn complete_slot(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Slot>, DutyError>;

    /// Replace the check-in token of a non-terminal slot.
    async fn set_slot_token(
        &self,
        id: Uuid,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Slot>, DutyError>;

    // Registrations

    /// Atomically check capacity and uniqueness, insert, and update status.
    async fn claim_spot(
        &self,
        registration: NewRegistration,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, DutyError>;

    /// Atomically soft-cancel the user's registration and update status.
    async fn release_spot(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, DutyError>;

    async fn find_registration(&self, id: Uuid) -> Result<Option<Registration>, DutyError>;

    async fn find_active_registration(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, DutyError>;

    async fn list_active_registrations(
        &self,
        slot_id: Uuid,
    ) -> Result<Vec<Registration>, DutyError>;

    /// Requires an active registration that has not checked in.
    async fn set_swap_offered(
        &self,
        registration_id: Uuid,
        offered: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError>;

    /// Requires an active, offered, not-checked-in registration. Fails with
    /// `Conflict` if the transferee already holds a spot on the slot.
    async fn transfer_registration(
        &self,
        registration_id: Uuid,
        transferee: &Transferee,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError>;

    /// Requires an active registration not checked in and not a no-show.
    async fn record_check_in(
        &self,
        registration_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError>;

    /// Requires checked in and not yet checked out.
    async fn record_check_out(
        &self,
        registration_id: Uuid,
        at: DateTime<Utc>,
        actual_minutes: i32,
    ) -> Result<Option<Registration>, DutyError>;

    /// Requires an active registration not checked in, confirmed or flagged.
    async fn mark_no_show(
        &self,
        registration_id: Uuid,
        marked_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError>;

    /// Flag every active registration on the slot that never checked in.
    async fn flag_no_shows(&self, slot_id: Uuid, now: DateTime<Utc>) -> Result<u64, DutyError>;

    /// Requires checked out, not a no-show, not yet confirmed.
    async fn confirm_registration(
        &self,
        registration_id: Uuid,
        confirmed_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>, DutyError>;

    /// Active registrations of the family on slots dated within `range`.
    async fn list_family_attendance(
        &self,
        family_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<FamilyAttendanceRecord>, DutyError>;

    // Outbox

    /// Undelivered events, oldest first.
    async fn list_pending_events(&self, limit: usize) -> Result<Vec<OutboxEvent>, DutyError>;

    /// Returns `false` if the event was already marked.
    async fn mark_event_delivered(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, DutyError>;
}

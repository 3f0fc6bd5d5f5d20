//! Registration domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A user's claim on a slot, carrying attendance and confirmation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Registration {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub user_id: Uuid,
    /// Display name captured at registration time.
    pub user_name: String,
    pub family_id: Uuid,
    pub checked_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_in_at: Option<DateTime<Utc>>,
    pub checked_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_out_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_minutes: Option<i32>,
    pub no_show: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_show_marked_by: Option<Uuid>,
    pub swap_offered: bool,
    pub confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Build a fresh registration as stores insert it.
    pub fn new(id: Uuid, new: NewRegistration, now: DateTime<Utc>) -> Self {
        Self {
            id,
            slot_id: new.slot_id,
            user_id: new.user_id,
            user_name: new.user_name,
            family_id: new.family_id,
            checked_in: false,
            check_in_at: None,
            checked_out: false,
            check_out_at: None,
            actual_minutes: None,
            no_show: false,
            no_show_marked_by: None,
            swap_offered: false,
            confirmed: false,
            confirmed_by: None,
            confirmed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Active registrations count toward the slot's capacity.
    pub fn is_active(&self) -> bool {
        self.cancelled_at.is_none()
    }

    /// Checked out, unconfirmed and not flagged: awaiting admin review.
    pub fn is_pending_confirmation(&self) -> bool {
        self.is_active() && self.checked_out && !self.confirmed && !self.no_show
    }

    /// Counts toward a family's completed hours.
    pub fn is_creditable(&self) -> bool {
        self.is_active() && self.checked_out && self.confirmed && !self.no_show
    }

    /// Hand the registration to a new holder, clearing attendance state.
    pub fn transfer_to(&mut self, transferee: &Transferee, now: DateTime<Utc>) {
        self.user_id = transferee.user_id;
        self.user_name = transferee.user_name.clone();
        self.family_id = transferee.family_id;
        self.checked_in = false;
        self.check_in_at = None;
        self.checked_out = false;
        self.check_out_at = None;
        self.actual_minutes = None;
        self.no_show = false;
        self.no_show_marked_by = None;
        self.swap_offered = false;
        self.confirmed = false;
        self.confirmed_by = None;
        self.confirmed_at = None;
        self.updated_at = now;
    }
}

/// Input for creating a registration.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct NewRegistration {
    pub slot_id: Uuid,
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "User name must be 1-100 characters"))]
    pub user_name: String,
    pub family_id: Uuid,
}

/// The user taking over an offered registration.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct Transferee {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "User name must be 1-100 characters"))]
    pub user_name: String,
    pub family_id: Uuid,
}

//! Integration tests for check-in, check-out, no-shows and confirmation.

mod common;

use chrono::Duration;
use common::{date, time, utc, TestParent, TestRoster};
use domain::models::{DutySettings, Slot, SlotStatus};
use domain::services::FixedJobHours;
use domain::DutyError;
use uuid::Uuid;

/// Slot on 2024-01-03 from 14:00 to 15:00 UTC with one registered parent.
async fn registered_parent() -> (TestRoster, Slot, TestParent) {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let slot = roster
        .single_slot(date(2024, 1, 3), time(14, 0), time(15, 0), 1, 3, 1.0)
        .await;
    let parent = TestParent::new();
    roster.register(&slot, &parent).await;
    (roster, slot, parent)
}

// ============================================================================
// Check-in Tests
// ============================================================================

#[tokio::test]
async fn test_check_in_and_out_records_minutes() {
    let (roster, slot, parent) = registered_parent().await;

    roster.clock.set(utc(2024, 1, 3, 14, 5));
    let checked_in = roster
        .attendance
        .check_in(slot.id, parent.user_id, &slot.qr_token)
        .await
        .unwrap();
    assert!(checked_in.checked_in);
    assert_eq!(checked_in.check_in_at, Some(utc(2024, 1, 3, 14, 5)));

    roster.clock.set(utc(2024, 1, 3, 14, 50));
    let checked_out = roster
        .attendance
        .check_out(slot.id, parent.user_id)
        .await
        .unwrap();
    assert!(checked_out.checked_out);
    assert_eq!(checked_out.check_out_at, Some(utc(2024, 1, 3, 14, 50)));
    assert_eq!(checked_out.actual_minutes, Some(45));
    assert!(!checked_out.confirmed);
}

#[tokio::test]
async fn test_check_in_rejects_wrong_token() {
    let (roster, slot, parent) = registered_parent().await;
    roster.clock.set(utc(2024, 1, 3, 14, 0));

    let result = roster
        .attendance
        .check_in(slot.id, parent.user_id, "chk_not-the-token")
        .await;
    assert!(matches!(result, Err(DutyError::Forbidden(_))));
}

#[tokio::test]
async fn test_check_in_window() {
    let (roster, slot, parent) = registered_parent().await;

    // Opens 30 minutes before start
    roster.clock.set(utc(2024, 1, 3, 13, 29));
    let early = roster
        .attendance
        .check_in(slot.id, parent.user_id, &slot.qr_token)
        .await;
    assert!(matches!(early, Err(DutyError::Forbidden(_))));

    roster.clock.set(utc(2024, 1, 3, 13, 30));
    assert!(roster
        .attendance
        .check_in(slot.id, parent.user_id, &slot.qr_token)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_check_in_closed_after_end() {
    let (roster, slot, parent) = registered_parent().await;
    roster.clock.set(utc(2024, 1, 3, 15, 0));

    let late = roster
        .attendance
        .check_in(slot.id, parent.user_id, &slot.qr_token)
        .await;
    assert!(matches!(late, Err(DutyError::Forbidden(_))));
}

#[tokio::test]
async fn test_check_in_on_cancelled_slot_is_forbidden() {
    let (roster, slot, parent) = registered_parent().await;
    roster
        .lifecycle
        .cancel_slot(slot.id, Uuid::new_v4(), None)
        .await
        .unwrap();
    roster.clock.set(utc(2024, 1, 3, 14, 0));

    let result = roster
        .attendance
        .check_in(slot.id, parent.user_id, &slot.qr_token)
        .await;
    assert!(matches!(result, Err(DutyError::Forbidden(_))));
}

#[tokio::test]
async fn test_check_in_requires_registration() {
    let (roster, slot, _) = registered_parent().await;
    roster.clock.set(utc(2024, 1, 3, 14, 0));

    let stranger = TestParent::new();
    let result = roster
        .attendance
        .check_in(slot.id, stranger.user_id, &slot.qr_token)
        .await;
    assert!(matches!(result, Err(DutyError::State(_))));
}

#[tokio::test]
async fn test_double_check_in_is_state_error() {
    let (roster, slot, parent) = registered_parent().await;
    roster.clock.set(utc(2024, 1, 3, 14, 0));
    roster
        .attendance
        .check_in(slot.id, parent.user_id, &slot.qr_token)
        .await
        .unwrap();

    let again = roster
        .attendance
        .check_in(slot.id, parent.user_id, &slot.qr_token)
        .await;
    assert!(matches!(again, Err(DutyError::State(_))));
}

#[tokio::test]
async fn test_rotated_token_invalidates_previous() {
    let (roster, slot, parent) = registered_parent().await;
    let rotated = roster.lifecycle.rotate_check_in_token(slot.id).await.unwrap();
    roster.clock.set(utc(2024, 1, 3, 14, 0));

    let stale = roster
        .attendance
        .check_in(slot.id, parent.user_id, &slot.qr_token)
        .await;
    assert!(matches!(stale, Err(DutyError::Forbidden(_))));

    assert!(roster
        .attendance
        .check_in(slot.id, parent.user_id, &rotated.qr_token)
        .await
        .is_ok());
}

// ============================================================================
// Check-out Tests
// ============================================================================

#[tokio::test]
async fn test_check_out_requires_check_in() {
    let (roster, slot, parent) = registered_parent().await;
    roster.clock.set(utc(2024, 1, 3, 14, 30));

    let result = roster.attendance.check_out(slot.id, parent.user_id).await;
    assert!(matches!(result, Err(DutyError::State(_))));
}

#[tokio::test]
async fn test_check_out_minutes_are_capped() {
    let (roster, slot, parent) = registered_parent().await;
    roster.clock.set(utc(2024, 1, 3, 14, 0));
    roster
        .attendance
        .check_in(slot.id, parent.user_id, &slot.qr_token)
        .await
        .unwrap();

    // Three hours later, on a one-hour slot with 30 minutes of grace
    roster.clock.advance(Duration::hours(3));
    let checked_out = roster
        .attendance
        .check_out(slot.id, parent.user_id)
        .await
        .unwrap();
    assert_eq!(checked_out.actual_minutes, Some(90));

    let again = roster.attendance.check_out(slot.id, parent.user_id).await;
    assert!(matches!(again, Err(DutyError::State(_))));
}

#[tokio::test]
async fn test_forgotten_check_out_allowed_on_completed_slot() {
    let (roster, slot, parent) = registered_parent().await;
    roster.clock.set(utc(2024, 1, 3, 14, 0));
    roster
        .attendance
        .check_in(slot.id, parent.user_id, &slot.qr_token)
        .await
        .unwrap();

    roster.clock.set(utc(2024, 1, 3, 15, 10));
    roster.lifecycle.reconcile().await.unwrap();
    assert_eq!(
        roster.lifecycle.get_slot(slot.id).await.unwrap().status,
        SlotStatus::Completed
    );

    let checked_out = roster
        .attendance
        .check_out(slot.id, parent.user_id)
        .await
        .unwrap();
    assert_eq!(checked_out.actual_minutes, Some(70));
}

// ============================================================================
// No-show and Confirmation Tests
// ============================================================================

#[tokio::test]
async fn test_mark_no_show_after_slot_end() {
    let (roster, slot, parent) = registered_parent().await;
    let registration = roster
        .registrations
        .list_registrations(slot.id)
        .await
        .unwrap()
        .remove(0);
    let admin = Uuid::new_v4();

    roster.clock.set(utc(2024, 1, 3, 14, 30));
    let early = roster.attendance.mark_no_show(registration.id, admin).await;
    assert!(matches!(early, Err(DutyError::State(_))));

    roster.clock.set(utc(2024, 1, 3, 15, 0));
    let flagged = roster
        .attendance
        .mark_no_show(registration.id, admin)
        .await
        .unwrap();
    assert!(flagged.no_show);
    assert_eq!(flagged.no_show_marked_by, Some(admin));
    assert_eq!(flagged.user_id, parent.user_id);

    let again = roster.attendance.mark_no_show(registration.id, admin).await;
    assert!(matches!(again, Err(DutyError::State(_))));
}

#[tokio::test]
async fn test_mark_no_show_rejected_after_check_in() {
    let (roster, slot, parent) = registered_parent().await;
    roster.clock.set(utc(2024, 1, 3, 14, 0));
    let registration = roster
        .attendance
        .check_in(slot.id, parent.user_id, &slot.qr_token)
        .await
        .unwrap();

    roster.clock.set(utc(2024, 1, 3, 16, 0));
    let result = roster
        .attendance
        .mark_no_show(registration.id, Uuid::new_v4())
        .await;
    assert!(matches!(result, Err(DutyError::State(_))));
}

#[tokio::test]
async fn test_confirm_flow() {
    let (roster, slot, parent) = registered_parent().await;
    roster.clock.set(utc(2024, 1, 3, 14, 0));
    let registration = roster
        .attendance
        .check_in(slot.id, parent.user_id, &slot.qr_token)
        .await
        .unwrap();
    let admin = Uuid::new_v4();

    let premature = roster.attendance.confirm(registration.id, admin).await;
    assert!(matches!(premature, Err(DutyError::State(_))));

    roster.clock.set(utc(2024, 1, 3, 15, 0));
    roster
        .attendance
        .check_out(slot.id, parent.user_id)
        .await
        .unwrap();

    roster.clock.set(utc(2024, 1, 4, 9, 0));
    let confirmed = roster.attendance.confirm(registration.id, admin).await.unwrap();
    assert!(confirmed.confirmed);
    assert_eq!(confirmed.confirmed_by, Some(admin));
    assert_eq!(confirmed.confirmed_at, Some(utc(2024, 1, 4, 9, 0)));

    let twice = roster.attendance.confirm(registration.id, admin).await;
    assert!(matches!(twice, Err(DutyError::State(_))));

    let no_show = roster.attendance.mark_no_show(registration.id, admin).await;
    assert!(matches!(no_show, Err(DutyError::State(_))));
}

#[tokio::test]
async fn test_reconcile_flags_no_shows_when_enabled() {
    let settings = DutySettings {
        auto_flag_no_shows: true,
        ..Default::default()
    };
    let roster = TestRoster::with_settings(utc(2024, 1, 1, 8, 0), settings, FixedJobHours::new());
    let slot = roster
        .single_slot(date(2024, 1, 3), time(14, 0), time(15, 0), 1, 3, 1.0)
        .await;
    let (present, absent) = (TestParent::new(), TestParent::new());
    roster.register(&slot, &present).await;
    roster.register(&slot, &absent).await;

    roster.clock.set(utc(2024, 1, 3, 14, 0));
    roster
        .attendance
        .check_in(slot.id, present.user_id, &slot.qr_token)
        .await
        .unwrap();

    roster.clock.set(utc(2024, 1, 3, 15, 30));
    let report = roster.lifecycle.reconcile().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.no_shows_flagged, 1);

    let registrations = roster.registrations.list_registrations(slot.id).await.unwrap();
    for registration in registrations {
        assert_eq!(registration.no_show, registration.user_id == absent.user_id);
    }
}

//! Integration tests for slot generation and the slot lifecycle.

mod common;

use chrono::{Duration, Weekday};
use common::{date, one_off_request, range, time, utc, weekly_request, TestParent, TestRoster};
use domain::models::{SlotStatus, UpdateDutyConfigRequest};
use domain::services::DutyEvent;
use domain::DutyError;
use uuid::Uuid;

// ============================================================================
// Generation Tests
// ============================================================================

#[tokio::test]
async fn test_weekly_config_generates_matching_weekdays() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let config = roster
        .create_config(weekly_request(Weekday::Wed, time(14, 0), time(16, 0), 1, 4, 2.0))
        .await;

    let slots = roster
        .expander
        .generate_slots(config.id, range(date(2024, 1, 1), date(2024, 1, 15)))
        .await
        .unwrap();

    let dates: Vec<_> = slots.iter().map(|s| s.slot_date).collect();
    assert_eq!(dates, vec![date(2024, 1, 3), date(2024, 1, 10)]);
    for slot in &slots {
        assert_eq!(slot.status, SlotStatus::Open);
        assert_eq!(slot.config_id, config.id);
        assert_eq!(slot.max_participants, 4);
        assert_eq!(slot.hours_credit, 2.0);
        assert!(slot.qr_token.starts_with("chk_"));
    }
}

#[tokio::test]
async fn test_generation_is_idempotent() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let config = roster
        .create_config(weekly_request(Weekday::Wed, time(14, 0), time(16, 0), 1, 4, 2.0))
        .await;
    let window = range(date(2024, 1, 1), date(2024, 1, 15));

    let first = roster.expander.generate_slots(config.id, window).await.unwrap();
    let second = roster.expander.generate_slots(config.id, window).await.unwrap();

    assert_eq!(first.len(), 2);
    assert!(second.is_empty());
    assert_eq!(roster.store.slot_count(), 2);

    // Overlapping range only adds the new date
    let third = roster
        .expander
        .generate_slots(config.id, range(date(2024, 1, 8), date(2024, 1, 22)))
        .await
        .unwrap();
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].slot_date, date(2024, 1, 17));
}

#[tokio::test]
async fn test_one_off_generates_single_slot_regardless_of_range() {
    let mut roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let config = roster
        .create_config(one_off_request(date(2024, 6, 15), time(10, 0), time(13, 0)))
        .await;

    let slots = roster
        .expander
        .generate_slots(config.id, range(date(2024, 1, 1), date(2024, 1, 8)))
        .await
        .unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].slot_date, date(2024, 6, 15));

    let again = roster
        .expander
        .generate_slots(config.id, range(date(2024, 6, 1), date(2024, 7, 1)))
        .await
        .unwrap();
    assert!(again.is_empty());

    // Queued with the config, published only by the dispatcher
    assert!(roster.events.try_recv().is_err());
    assert_eq!(roster.store.pending_event_count(), 1);
    let report = roster.dispatcher.dispatch_pending(10).await.unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(roster.store.pending_event_count(), 0);

    match roster.events.try_recv() {
        Ok(DutyEvent::OneOffDutyCreated(payload)) => {
            assert_eq!(payload.config_id, config.id);
            assert_eq!(payload.date, date(2024, 6, 15));
            assert_eq!(payload.calendar_event_id, config.calendar_event_id);
        }
        other => panic!("Expected one-off event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_weekly_config_publishes_no_event() {
    let mut roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    roster
        .create_config(weekly_request(Weekday::Mon, time(14, 0), time(15, 0), 1, 2, 1.0))
        .await;
    assert_eq!(roster.store.pending_event_count(), 0);
    let report = roster.dispatcher.dispatch_pending(10).await.unwrap();
    assert_eq!(report.examined, 0);
    assert!(roster.events.try_recv().is_err());
}

#[tokio::test]
async fn test_inactive_config_generates_nothing() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let config = roster
        .create_config(weekly_request(Weekday::Wed, time(14, 0), time(16, 0), 1, 4, 2.0))
        .await;
    roster.configs.deactivate_config(config.id).await.unwrap();

    let slots = roster
        .expander
        .generate_slots(config.id, range(date(2024, 1, 1), date(2024, 1, 15)))
        .await
        .unwrap();
    assert!(slots.is_empty());
    assert_eq!(roster.store.slot_count(), 0);
}

#[tokio::test]
async fn test_reactivated_config_generates_again() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let config = roster
        .create_config(weekly_request(Weekday::Wed, time(14, 0), time(16, 0), 1, 4, 2.0))
        .await;

    let deactivated = roster.configs.deactivate_config(config.id).await.unwrap();
    assert!(!deactivated.active);
    assert!(!roster.configs.get_config(config.id).await.unwrap().active);

    let reactivated = roster.configs.set_active(config.id, true).await.unwrap();
    assert!(reactivated.active);

    let slots = roster
        .expander
        .generate_slots(config.id, range(date(2024, 1, 1), date(2024, 1, 8)))
        .await
        .unwrap();
    assert_eq!(slots.len(), 1);
}

#[tokio::test]
async fn test_get_unknown_config_is_not_found() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let result = roster.configs.get_config(Uuid::new_v4()).await;
    assert!(matches!(result, Err(DutyError::NotFound(_))));
}

#[tokio::test]
async fn test_unknown_config_is_not_found() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let result = roster
        .expander
        .generate_slots(Uuid::new_v4(), range(date(2024, 1, 1), date(2024, 1, 15)))
        .await;
    assert!(matches!(result, Err(DutyError::NotFound(_))));
}

#[tokio::test]
async fn test_reversed_range_is_rejected() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let config = roster
        .create_config(weekly_request(Weekday::Wed, time(14, 0), time(16, 0), 1, 4, 2.0))
        .await;
    let result = roster
        .expander
        .generate_slots(config.id, range(date(2024, 1, 15), date(2024, 1, 1)))
        .await;
    assert!(matches!(result, Err(DutyError::Validation(_))));
}

#[tokio::test]
async fn test_generate_upcoming_covers_all_active_configs() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    roster
        .create_config(weekly_request(Weekday::Wed, time(14, 0), time(16, 0), 1, 4, 2.0))
        .await;
    roster
        .create_config(one_off_request(date(2024, 1, 20), time(10, 0), time(12, 0)))
        .await;
    let inactive = roster
        .create_config(weekly_request(Weekday::Thu, time(14, 0), time(16, 0), 1, 4, 2.0))
        .await;
    roster.configs.deactivate_config(inactive.id).await.unwrap();

    let report = roster.expander.generate_upcoming(14).await.unwrap();
    assert_eq!(report.configs, 2);
    assert_eq!(report.slots_created, 3);
    assert_eq!(report.failed, 0);

    let rerun = roster.expander.generate_upcoming(14).await.unwrap();
    assert_eq!(rerun.slots_created, 0);
}

#[tokio::test]
async fn test_config_edits_do_not_change_existing_slots() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let config = roster
        .create_config(weekly_request(Weekday::Wed, time(14, 0), time(16, 0), 1, 4, 2.0))
        .await;
    let existing = roster
        .expander
        .generate_slots(config.id, range(date(2024, 1, 1), date(2024, 1, 8)))
        .await
        .unwrap();

    roster
        .configs
        .update_config(
            config.id,
            UpdateDutyConfigRequest {
                max_participants: Some(8),
                hours_credit: Some(3.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let unchanged = roster.lifecycle.get_slot(existing[0].id).await.unwrap();
    assert_eq!(unchanged.max_participants, 4);
    assert_eq!(unchanged.hours_credit, 2.0);

    let later = roster
        .expander
        .generate_slots(config.id, range(date(2024, 1, 8), date(2024, 1, 15)))
        .await
        .unwrap();
    assert_eq!(later[0].max_participants, 8);
    assert_eq!(later[0].hours_credit, 3.0);
}

#[tokio::test]
async fn test_update_rejects_inverted_window() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let config = roster
        .create_config(weekly_request(Weekday::Wed, time(14, 0), time(16, 0), 1, 4, 2.0))
        .await;
    let result = roster
        .configs
        .update_config(
            config.id,
            UpdateDutyConfigRequest {
                end_time: Some(time(13, 0)),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(DutyError::Validation(_))));
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_cancel_slot_is_terminal() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let slot = roster
        .single_slot(date(2024, 1, 3), time(14, 0), time(15, 0), 1, 2, 1.0)
        .await;
    let admin = Uuid::new_v4();

    let cancelled = roster
        .lifecycle
        .cancel_slot(slot.id, admin, Some("Building closed"))
        .await
        .unwrap();
    assert_eq!(cancelled.status, SlotStatus::Cancelled);
    assert!(cancelled.cancelled);
    assert_eq!(cancelled.cancelled_by, Some(admin));
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Building closed"));
    assert_eq!(cancelled.cancelled_at, Some(utc(2024, 1, 1, 8, 0)));

    let again = roster.lifecycle.cancel_slot(slot.id, admin, None).await;
    assert!(matches!(again, Err(DutyError::State(_))));

    let parent = TestParent::new();
    let register = roster
        .registrations
        .register(slot.id, parent.user_id, &parent.name, parent.family_id)
        .await;
    assert!(matches!(register, Err(DutyError::Conflict(_))));
}

#[tokio::test]
async fn test_reconcile_completes_ended_slots_once() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let slot = roster
        .single_slot(date(2024, 1, 3), time(14, 0), time(15, 0), 1, 2, 1.0)
        .await;

    let early = roster.lifecycle.reconcile().await.unwrap();
    assert_eq!(early.completed, 0);

    roster.clock.set(utc(2024, 1, 3, 15, 0));
    let report = roster.lifecycle.reconcile().await.unwrap();
    assert_eq!(report.completed, 1);
    let completed = roster.lifecycle.get_slot(slot.id).await.unwrap();
    assert_eq!(completed.status, SlotStatus::Completed);
    assert_eq!(completed.completed_at, Some(utc(2024, 1, 3, 15, 0)));

    roster.clock.advance(Duration::hours(1));
    let rerun = roster.lifecycle.reconcile().await.unwrap();
    assert_eq!(rerun.completed, 0);

    let parent = TestParent::new();
    let register = roster
        .registrations
        .register(slot.id, parent.user_id, &parent.name, parent.family_id)
        .await;
    assert!(matches!(register, Err(DutyError::State(_))));

    let cancel = roster.lifecycle.cancel_slot(slot.id, Uuid::new_v4(), None).await;
    assert!(matches!(cancel, Err(DutyError::State(_))));
}

#[tokio::test]
async fn test_reconcile_respects_local_offset() {
    let settings = domain::models::DutySettings {
        utc_offset_minutes: 120,
        ..Default::default()
    };
    let roster = TestRoster::with_settings(
        utc(2024, 1, 1, 8, 0),
        settings,
        domain::services::FixedJobHours::new(),
    );
    let slot = roster
        .single_slot(date(2024, 1, 3), time(14, 0), time(15, 0), 1, 2, 1.0)
        .await;

    // 13:30 UTC is 15:30 local, past the 15:00 local end
    roster.clock.set(utc(2024, 1, 3, 13, 30));
    let report = roster.lifecycle.reconcile().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(
        roster.lifecycle.get_slot(slot.id).await.unwrap().status,
        SlotStatus::Completed
    );
}

#[tokio::test]
async fn test_rotate_token_replaces_credential() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let slot = roster
        .single_slot(date(2024, 1, 3), time(14, 0), time(15, 0), 1, 2, 1.0)
        .await;

    let rotated = roster.lifecycle.rotate_check_in_token(slot.id).await.unwrap();
    assert_ne!(rotated.qr_token, slot.qr_token);
    assert!(rotated.qr_token.starts_with("chk_"));

    roster
        .lifecycle
        .cancel_slot(slot.id, Uuid::new_v4(), None)
        .await
        .unwrap();
    let result = roster.lifecycle.rotate_check_in_token(slot.id).await;
    assert!(matches!(result, Err(DutyError::State(_))));
}

#[tokio::test]
async fn test_slots_needing_participants() {
    let roster = TestRoster::new(utc(2024, 1, 1, 8, 0));
    let short = roster
        .single_slot(date(2024, 1, 3), time(14, 0), time(15, 0), 2, 4, 1.0)
        .await;
    let staffed = roster
        .single_slot(date(2024, 1, 4), time(14, 0), time(15, 0), 1, 4, 1.0)
        .await;
    roster.register(&short, &TestParent::new()).await;
    roster.register(&staffed, &TestParent::new()).await;

    let needing = roster
        .lifecycle
        .slots_needing_participants(range(date(2024, 1, 1), date(2024, 1, 8)))
        .await
        .unwrap();
    assert_eq!(needing.len(), 1);
    assert_eq!(needing[0].slot.id, short.id);
    assert_eq!(needing[0].registered, 1);
    // A read surface only; the slot keeps its status
    assert_eq!(needing[0].slot.status, SlotStatus::Open);
}

#[tokio::test]
async fn test_upcoming_slots_skips_past_and_terminal() {
    let roster = TestRoster::new(utc(2024, 1, 3, 16, 0));
    let section_id = Uuid::new_v4();
    let mut request = weekly_request(Weekday::Wed, time(14, 0), time(15, 0), 1, 2, 1.0);
    request.section_id = section_id;
    let config = roster.create_config(request).await;
    roster
        .expander
        .generate_slots(config.id, range(date(2024, 1, 1), date(2024, 1, 25)))
        .await
        .unwrap();

    let upcoming = roster
        .lifecycle
        .upcoming_slots(Some(section_id), 10)
        .await
        .unwrap();
    let dates: Vec<_> = upcoming.iter().map(|o| o.slot.slot_date).collect();
    // 2024-01-03 already ended at 15:00
    assert_eq!(dates, vec![date(2024, 1, 10), date(2024, 1, 17), date(2024, 1, 24)]);

    roster
        .lifecycle
        .cancel_slot(upcoming[0].slot.id, Uuid::new_v4(), None)
        .await
        .unwrap();
    let limited = roster
        .lifecycle
        .upcoming_slots(Some(section_id), 1)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].slot.slot_date, date(2024, 1, 17));

    let other_section = roster
        .lifecycle
        .upcoming_slots(Some(Uuid::new_v4()), 10)
        .await
        .unwrap();
    assert!(other_section.is_empty());
}

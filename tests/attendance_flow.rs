//! Full-day attendance lifecycle: check-in, breaks, check-out, snapshots.

use shiftdesk_api::attendance::{AttendanceError, Punctuality};
use shiftdesk_api::database::models::{ActivityKind, BreakRequestStatus, BreakType, SessionStatus};
use shiftdesk_api::testing::Harness;

#[tokio::test]
async fn check_in_within_grace_is_on_time() {
    let h = Harness::new().await;
    h.clock.set("2024-03-11T09:07:00Z".parse().unwrap());

    let outcome = h.service.check_in(h.agent.id, None, None).await.unwrap();
    assert_eq!(outcome.punctuality, Punctuality::OnTime);
    assert_eq!(outcome.late_minutes, 0);
    assert_eq!(outcome.session.status, SessionStatus::Active);
    assert_eq!(outcome.shift.id, h.shift.id);
}

#[tokio::test]
async fn check_in_past_grace_is_late_by_the_overshoot() {
    let h = Harness::new().await;
    h.clock.set("2024-03-11T09:25:00Z".parse().unwrap());

    let outcome = h.service.check_in(h.agent.id, None, None).await.unwrap();
    assert_eq!(outcome.punctuality, Punctuality::Late);
    assert_eq!(outcome.late_minutes, 15);
    assert_eq!(outcome.session.late_minutes, 15);
}

#[tokio::test]
async fn second_check_in_same_day_fails() {
    let h = Harness::new().await;
    h.service.check_in(h.agent.id, None, None).await.unwrap();

    let err = h.service.check_in(h.agent.id, None, None).await.unwrap_err();
    assert!(matches!(err, AttendanceError::AlreadyCheckedIn));
    assert_eq!(err.code(), "ALREADY_CHECKED_IN");
}

#[tokio::test]
async fn break_round_trip_accumulates_exact_elapsed_minutes() {
    let h = Harness::new().await;
    h.service.check_in(h.agent.id, None, None).await.unwrap();
    h.clock.advance_minutes(65);

    let outcome = h
        .service
        .request_break(h.agent.id, BreakType::Short, 10, None)
        .await
        .unwrap();
    assert!(!outcome.requires_approval);
    assert_eq!(outcome.request.status, BreakRequestStatus::Active);

    // Back two minutes early; early end is allowed.
    h.clock.advance_minutes(8);
    let ended = h.service.end_break(h.agent.id).await.unwrap();
    assert_eq!(ended.actual_minutes, 8);
    assert_eq!(ended.request.status, BreakRequestStatus::Ended);

    let session = h.service.today(h.agent.id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.break_minutes, 8);

    // Accumulated minutes equal the sum of ended break actuals.
    let total: i32 = h
        .store
        .breaks_for_session(session.id)
        .await
        .iter()
        .filter(|b| b.status == BreakRequestStatus::Ended)
        .map(|b| b.actual_minutes.unwrap())
        .sum();
    assert_eq!(session.break_minutes, total);
}

#[tokio::test]
async fn check_out_on_break_is_rejected_until_break_ends() {
    let h = Harness::new().await;
    h.clock.set("2024-03-11T09:00:00Z".parse().unwrap());
    h.service.check_in(h.agent.id, None, None).await.unwrap();

    h.clock.advance_minutes(120);
    h.service
        .request_break(h.agent.id, BreakType::Lunch, 30, None)
        .await
        .unwrap();

    let err = h.service.check_out(h.agent.id, None, None).await.unwrap_err();
    assert!(matches!(err, AttendanceError::CannotCheckOutOnBreak));

    h.clock.advance_minutes(30);
    h.service.end_break(h.agent.id).await.unwrap();

    h.clock.advance_minutes(330);
    let outcome = h.service.check_out(h.agent.id, None, None).await.unwrap();

    // 09:00 -> 17:00 with a 30 minute lunch.
    assert_eq!(outcome.summary.total_minutes, 480);
    assert_eq!(outcome.summary.break_minutes, 30);
    assert_eq!(outcome.summary.work_minutes, 450);
    assert_eq!(outcome.session.status, SessionStatus::Completed);
    assert!(outcome.session.check_out_at.is_some());
}

#[tokio::test]
async fn check_out_without_session_and_after_completion() {
    let h = Harness::new().await;

    let err = h.service.check_out(h.agent.id, None, None).await.unwrap_err();
    assert!(matches!(err, AttendanceError::NoActiveSession));

    h.service.check_in(h.agent.id, None, None).await.unwrap();
    h.clock.advance_minutes(480);
    h.service.check_out(h.agent.id, None, None).await.unwrap();

    let err = h.service.check_out(h.agent.id, None, None).await.unwrap_err();
    assert!(matches!(err, AttendanceError::AlreadyCheckedOut));
}

#[tokio::test]
async fn snapshots_enforce_ownership() {
    let h = Harness::new().await;
    let bob = h.add_agent("Bob").await;

    let outcome = h.service.check_in(h.agent.id, None, None).await.unwrap();
    let session_id = outcome.session.id;

    // The owner and an admin can read it.
    h.service
        .session_snapshot(h.agent.id, false, session_id)
        .await
        .unwrap();
    h.service
        .session_snapshot(h.admin.id, true, session_id)
        .await
        .unwrap();

    let err = h
        .service
        .session_snapshot(bob.id, false, session_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::NotYourSession));
}

#[tokio::test]
async fn every_transition_is_audited() {
    let h = Harness::new().await;
    h.service.check_in(h.agent.id, None, None).await.unwrap();
    h.clock.advance_minutes(90);
    h.service
        .request_break(h.agent.id, BreakType::Short, 10, None)
        .await
        .unwrap();
    h.clock.advance_minutes(10);
    h.service.end_break(h.agent.id).await.unwrap();
    h.clock.advance_minutes(300);
    h.service.check_out(h.agent.id, None, None).await.unwrap();

    let actions: Vec<ActivityKind> = h
        .store
        .activity()
        .await
        .into_iter()
        .map(|e| e.action)
        .collect();

    assert_eq!(
        actions,
        vec![
            ActivityKind::CheckIn,
            ActivityKind::BreakRequested,
            ActivityKind::BreakStarted,
            ActivityKind::BreakEnded,
            ActivityKind::CheckOut,
        ]
    );
}

#[tokio::test]
async fn agents_have_independent_sessions() {
    let h = Harness::new().await;
    let bob = h.add_agent("Bob").await;

    h.service.check_in(h.agent.id, None, None).await.unwrap();
    h.service.check_in(bob.id, None, None).await.unwrap();

    h.clock.advance_minutes(60);
    h.service
        .request_break(bob.id, BreakType::Short, 10, None)
        .await
        .unwrap();

    // Ada's session is untouched by Bob's break.
    let ada = h.service.today(h.agent.id).await.unwrap().unwrap();
    assert_eq!(ada.status, SessionStatus::Active);
    let bobs = h.service.today(bob.id).await.unwrap().unwrap();
    assert_eq!(bobs.status, SessionStatus::OnBreak);
}

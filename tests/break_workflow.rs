//! Break policy enforcement and the approval workflow.

use shiftdesk_api::attendance::AttendanceError;
use shiftdesk_api::database::models::{BreakRequestStatus, BreakType, SessionStatus};
use shiftdesk_api::testing::{Harness, HarnessConfig};

async fn checked_in(h: &Harness) {
    h.clock.set("2024-03-11T09:00:00Z".parse().unwrap());
    h.service.check_in(h.agent.id, None, None).await.unwrap();
    h.clock.advance_minutes(60);
}

#[tokio::test]
async fn break_shorter_than_policy_minimum_is_rejected() {
    let h = Harness::new().await;
    checked_in(&h).await;

    let err = h
        .service
        .request_break(h.agent.id, BreakType::Short, 3, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::BreakTooShort { min_minutes: 5 }));
    assert_eq!(err.code(), "BREAK_TOO_SHORT");
}

#[tokio::test]
async fn break_longer_than_policy_maximum_is_rejected() {
    let h = Harness::new().await;
    checked_in(&h).await;

    let err = h
        .service
        .request_break(h.agent.id, BreakType::Lunch, 90, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::BreakTooLong { max_minutes: 60 }));
}

#[tokio::test]
async fn disallowed_break_type_is_rejected() {
    let h = Harness::new().await;
    checked_in(&h).await;

    let err = h
        .service
        .request_break(h.agent.id, BreakType::Emergency, 10, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AttendanceError::BreakTypeNotAllowed { break_type: BreakType::Emergency }
    ));
}

#[tokio::test]
async fn daily_break_cap_is_enforced() {
    let h = Harness::new().await;
    checked_in(&h).await;

    for _ in 0..2 {
        h.service
            .request_break(h.agent.id, BreakType::Short, 10, None)
            .await
            .unwrap();
        h.clock.advance_minutes(10);
        h.service.end_break(h.agent.id).await.unwrap();
        // Past the 30 minute cooldown before the next one.
        h.clock.advance_minutes(45);
    }

    let err = h
        .service
        .request_break(h.agent.id, BreakType::Short, 10, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::MaxBreaksReached { max_breaks: 2 }));
}

#[tokio::test]
async fn cooldown_blocks_back_to_back_breaks() {
    let h = Harness::new().await;
    checked_in(&h).await;

    h.service
        .request_break(h.agent.id, BreakType::Short, 10, None)
        .await
        .unwrap();
    h.clock.advance_minutes(10);
    h.service.end_break(h.agent.id).await.unwrap();

    h.clock.advance_minutes(12);
    let err = h
        .service
        .request_break(h.agent.id, BreakType::Short, 10, None)
        .await
        .unwrap_err();
    match err {
        AttendanceError::BreakCooldownActive { remaining_minutes } => {
            assert_eq!(remaining_minutes, 18);
        }
        other => panic!("expected cooldown error, got {other:?}"),
    }
}

#[tokio::test]
async fn requesting_while_on_break_is_rejected() {
    let h = Harness::new().await;
    checked_in(&h).await;

    h.service
        .request_break(h.agent.id, BreakType::Short, 10, None)
        .await
        .unwrap();

    let err = h
        .service
        .request_break(h.agent.id, BreakType::Short, 10, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::BreakAlreadyActive));
}

#[tokio::test]
async fn ending_without_a_break_is_rejected() {
    let h = Harness::new().await;
    checked_in(&h).await;

    let err = h.service.end_break(h.agent.id).await.unwrap_err();
    assert!(matches!(err, AttendanceError::NoActiveBreak));
}

#[tokio::test]
async fn approval_flow_starts_break_only_on_decision() {
    let h = Harness::with_approval().await;
    checked_in(&h).await;

    let outcome = h
        .service
        .request_break(h.agent.id, BreakType::Lunch, 45, Some("lunch run".into()))
        .await
        .unwrap();
    assert!(outcome.requires_approval);
    assert_eq!(outcome.request.status, BreakRequestStatus::Pending);

    // Session keeps running while the request waits.
    let session = h.service.today(h.agent.id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Active);

    h.clock.advance_minutes(5);
    let approved = h
        .service
        .approve_break(outcome.request.id, h.admin.id, Some("enjoy".into()))
        .await
        .unwrap();
    assert_eq!(approved.request.status, BreakRequestStatus::Active);
    assert_eq!(approved.request.decided_by, Some(h.admin.id));
    assert_eq!(approved.session.status, SessionStatus::OnBreak);

    // The break runs from the approval, not the request.
    h.clock.advance_minutes(40);
    let ended = h.service.end_break(h.agent.id).await.unwrap();
    assert_eq!(ended.actual_minutes, 40);

    let session = h.service.today(h.agent.id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.break_minutes, 40);
}

#[tokio::test]
async fn rejection_requires_a_reason() {
    let h = Harness::with_approval().await;
    checked_in(&h).await;

    let outcome = h
        .service
        .request_break(h.agent.id, BreakType::Short, 10, None)
        .await
        .unwrap();

    let err = h
        .service
        .reject_break(outcome.request.id, h.admin.id, "  ")
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::RejectionReasonRequired));

    let rejected = h
        .service
        .reject_break(outcome.request.id, h.admin.id, "short-staffed")
        .await
        .unwrap();
    assert_eq!(rejected.request.status, BreakRequestStatus::Rejected);
    assert_eq!(rejected.request.decision_notes.as_deref(), Some("short-staffed"));

    // Session never left active, and the decision is final.
    let session = h.service.today(h.agent.id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Active);

    let err = h
        .service
        .approve_break(outcome.request.id, h.admin.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::BreakNotPending));
}

#[tokio::test]
async fn approving_while_already_on_break_is_rejected() {
    let h = Harness::with_approval().await;
    checked_in(&h).await;

    let first = h
        .service
        .request_break(h.agent.id, BreakType::Short, 10, None)
        .await
        .unwrap();
    let second = h
        .service
        .request_break(h.agent.id, BreakType::Short, 10, None)
        .await
        .unwrap();

    h.service
        .approve_break(first.request.id, h.admin.id, None)
        .await
        .unwrap();

    let err = h
        .service
        .approve_break(second.request.id, h.admin.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::AlreadyOnBreak));
}

#[tokio::test]
async fn unknown_break_request_is_not_found() {
    let h = Harness::with_approval().await;

    let err = h
        .service
        .approve_break(uuid::Uuid::new_v4(), h.admin.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AttendanceError::BreakRequestNotFound));
}

#[tokio::test]
async fn rejected_breaks_do_not_count_toward_the_cap() {
    let h = Harness::build(HarnessConfig {
        requires_approval: true,
        max_breaks_per_day: 1,
        ..Default::default()
    })
    .await;
    checked_in(&h).await;

    let first = h
        .service
        .request_break(h.agent.id, BreakType::Short, 10, None)
        .await
        .unwrap();
    h.service
        .reject_break(first.request.id, h.admin.id, "not now")
        .await
        .unwrap();

    // The slot is still free after the rejection.
    h.service
        .request_break(h.agent.id, BreakType::Short, 10, None)
        .await
        .unwrap();
}

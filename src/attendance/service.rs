use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::clock::{minutes_between, Clock};
use crate::config::AttendanceConfig;
use crate::database::models::{
    ActivityKind, Agent, AgentSession, BreakPolicy, BreakRequestStatus, BreakType, SessionStatus,
    Shift,
};
use crate::store::{
    AttendanceStore, BreakPatch, NewActivityEntry, NewBreakRequest, NewSession, SessionPatch,
    ShiftProvider, StoreError,
};

use super::error::AttendanceError;
use super::outcome::{
    ApproveBreakOutcome, BreakRequestOutcome, CheckInOutcome, CheckOutOutcome, EndBreakOutcome,
    Punctuality, ReconcileOutcome, RejectBreakOutcome, WorkSummary,
};

type Result<T> = std::result::Result<T, AttendanceError>;

/// Orchestrates the per-agent, per-day attendance lifecycle:
/// `not_started -> active -> (on_break <-> active)* -> completed`, with
/// `incomplete` reachable only through [`AttendanceService::reconcile_abandoned`].
///
/// Every action validates against the loaded state, then applies its writes
/// through one store transaction with compare-and-set status guards, so a
/// losing concurrent action gets a typed error instead of a double apply.
/// Each transition appends exactly one activity-log entry (auto-approved
/// break requests log the request and the start, which are two transitions).
pub struct AttendanceService {
    store: Arc<dyn AttendanceStore>,
    directory: Arc<dyn ShiftProvider>,
    clock: Arc<dyn Clock>,
    policy: AttendanceConfig,
}

impl AttendanceService {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        directory: Arc<dyn ShiftProvider>,
        clock: Arc<dyn Clock>,
        policy: AttendanceConfig,
    ) -> Self {
        Self {
            store,
            directory,
            clock,
            policy,
        }
    }

    /// Current calendar day, from the injected clock.
    pub fn work_date(&self) -> NaiveDate {
        self.clock.work_date()
    }

    async fn agent(&self, agent_id: Uuid) -> Result<Agent> {
        self.directory
            .get_agent(agent_id)
            .await?
            .ok_or(AttendanceError::AgentNotFound)
    }

    async fn shift_for(&self, agent: &Agent) -> Result<Shift> {
        let shift_id = agent.shift_id.ok_or(AttendanceError::NoShiftAssigned)?;
        self.directory
            .get_shift(shift_id)
            .await?
            .ok_or(AttendanceError::ShiftNotFound)
    }

    async fn break_policy(&self, shift: &Shift) -> Result<BreakPolicy> {
        self.directory
            .get_break_policy(shift.break_policy_id)
            .await?
            .ok_or(AttendanceError::BreakPolicyNotFound)
    }

    /// Clock in for today's shift. Creates the session (or claims a
    /// `not_started` placeholder) and records lateness relative to shift
    /// start plus grace.
    pub async fn check_in(
        &self,
        agent_id: Uuid,
        ip: Option<String>,
        location: Option<String>,
    ) -> Result<CheckInOutcome> {
        let agent = self.agent(agent_id).await?;
        let shift = self.shift_for(&agent).await?;

        let now = self.clock.now();
        let today = self.clock.work_date();

        let deadline = shift.latest_on_time(today);
        let late_minutes = if now > deadline {
            minutes_between(deadline, now)
        } else {
            0
        };

        if let Some(cutoff) = self.policy.late_checkin_cutoff_minutes {
            if late_minutes > cutoff {
                return Err(AttendanceError::TooLateToCheckIn { late_minutes });
            }
        }
        let late_minutes = late_minutes as i32;

        let mut tx = self.store.begin().await?;

        // One open session per agent, full stop. This also catches a
        // yesterday session the reconciliation sweep has not closed yet.
        if tx.find_current_session(agent_id).await?.is_some() {
            return Err(AttendanceError::AlreadyCheckedIn);
        }

        let session = match tx.find_session_for_day(agent_id, today).await? {
            Some(existing) if existing.status == SessionStatus::Completed => {
                if !self.policy.allow_recheck_in {
                    return Err(AttendanceError::AlreadyCheckedOut);
                }
                // Double shift: reopen the completed session. Original
                // check-in, lateness, and accumulated breaks stand.
                tx.transition_session(
                    existing.id,
                    SessionStatus::Completed,
                    SessionPatch {
                        status: Some(SessionStatus::Active),
                        ..Default::default()
                    },
                )
                .await?
                .ok_or(AttendanceError::AlreadyCheckedIn)?
            }
            Some(placeholder) => {
                // A pre-created or reconciled row for today; claim it.
                tx.transition_session(
                    placeholder.id,
                    placeholder.status,
                    SessionPatch {
                        status: Some(SessionStatus::Active),
                        check_in_at: Some(now),
                        check_in_ip: ip.clone(),
                        check_in_location: location.clone(),
                        late_minutes: Some(late_minutes),
                        ..Default::default()
                    },
                )
                .await?
                .ok_or(AttendanceError::AlreadyCheckedIn)?
            }
            None => {
                let inserted = tx
                    .insert_session(NewSession {
                        agent_id,
                        work_date: today,
                        shift_id: shift.id,
                        status: SessionStatus::Active,
                        check_in_at: Some(now),
                        check_in_ip: ip.clone(),
                        check_in_location: location.clone(),
                        late_minutes,
                    })
                    .await;
                match inserted {
                    Ok(session) => session,
                    // Lost the insert race to a concurrent check-in.
                    Err(StoreError::Duplicate(_)) => {
                        return Err(AttendanceError::AlreadyCheckedIn)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        // Report the session's recorded lateness: for a reopened double
        // shift that is the original morning value, not minutes since 09:00.
        let late_minutes = session.late_minutes;
        let punctuality = if late_minutes > 0 {
            Punctuality::Late
        } else {
            Punctuality::OnTime
        };

        tx.append_activity(NewActivityEntry {
            agent_id,
            session_id: Some(session.id),
            action: ActivityKind::CheckIn,
            details: json!({
                "ip": ip,
                "location": location,
                "late_minutes": late_minutes,
                "shift_id": shift.id,
            }),
            recorded_at: now,
        })
        .await?;
        tx.commit().await?;

        info!(agent = %agent_id, session = %session.id, late_minutes, "agent checked in");

        Ok(CheckInOutcome {
            session,
            shift,
            punctuality,
            late_minutes,
        })
    }

    /// Clock out of the open session and compute the day's work summary.
    /// Rejected while a break is running; `end_break` must come first.
    pub async fn check_out(
        &self,
        agent_id: Uuid,
        ip: Option<String>,
        location: Option<String>,
    ) -> Result<CheckOutOutcome> {
        self.agent(agent_id).await?;

        let now = self.clock.now();
        let today = self.clock.work_date();

        let mut tx = self.store.begin().await?;

        let session = match tx.find_current_session(agent_id).await? {
            Some(session) => session,
            None => {
                // Distinguish "already done for today" from "never started".
                return match tx.find_session_for_day(agent_id, today).await? {
                    Some(s) if s.status == SessionStatus::Completed => {
                        Err(AttendanceError::AlreadyCheckedOut)
                    }
                    _ => Err(AttendanceError::NoActiveSession),
                };
            }
        };

        if session.status == SessionStatus::OnBreak {
            return Err(AttendanceError::CannotCheckOutOnBreak);
        }

        let check_in_at = session.check_in_at.ok_or(AttendanceError::NoActiveSession)?;

        let session = tx
            .transition_session(
                session.id,
                SessionStatus::Active,
                SessionPatch {
                    status: Some(SessionStatus::Completed),
                    check_out_at: Some(now),
                    check_out_ip: ip.clone(),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AttendanceError::AlreadyCheckedOut)?;

        let total_minutes = minutes_between(check_in_at, now);
        let break_minutes = session.break_minutes as i64;
        let summary = WorkSummary {
            total_minutes,
            break_minutes,
            work_minutes: total_minutes - break_minutes,
        };

        tx.append_activity(NewActivityEntry {
            agent_id,
            session_id: Some(session.id),
            action: ActivityKind::CheckOut,
            details: json!({
                "ip": ip,
                "location": location,
                "total_minutes": summary.total_minutes,
                "break_minutes": summary.break_minutes,
                "work_minutes": summary.work_minutes,
            }),
            recorded_at: now,
        })
        .await?;
        tx.commit().await?;

        info!(agent = %agent_id, session = %session.id, work_minutes = summary.work_minutes, "agent checked out");

        Ok(CheckOutOutcome { session, summary })
    }

    /// Ask for a break. Under an approval-required policy the request stays
    /// `pending` and the session keeps running; otherwise the break starts
    /// immediately and the session goes `on_break`.
    pub async fn request_break(
        &self,
        agent_id: Uuid,
        break_type: BreakType,
        requested_minutes: i32,
        reason: Option<String>,
    ) -> Result<BreakRequestOutcome> {
        let agent = self.agent(agent_id).await?;
        let shift = self.shift_for(&agent).await?;
        let policy = self.break_policy(&shift).await?;

        if !policy.allows(break_type) {
            return Err(AttendanceError::BreakTypeNotAllowed { break_type });
        }
        let limits = policy
            .limits_for(break_type)
            .ok_or(AttendanceError::BreakTypeNotAllowed { break_type })?;
        if requested_minutes < limits.min_minutes {
            return Err(AttendanceError::BreakTooShort {
                min_minutes: limits.min_minutes,
            });
        }
        if requested_minutes > limits.max_minutes {
            return Err(AttendanceError::BreakTooLong {
                max_minutes: limits.max_minutes,
            });
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let session = tx
            .find_current_session(agent_id)
            .await?
            .ok_or(AttendanceError::NoActiveSession)?;
        if session.status == SessionStatus::OnBreak {
            return Err(AttendanceError::BreakAlreadyActive);
        }

        let taken = tx.count_breaks(session.id).await?;
        if taken >= policy.max_breaks_per_day as i64 {
            return Err(AttendanceError::MaxBreaksReached {
                max_breaks: policy.max_breaks_per_day,
            });
        }

        if let Some(last_end) = tx.last_break_end(session.id).await? {
            let ready_at = last_end + Duration::minutes(policy.cooldown_minutes as i64);
            if now < ready_at {
                let remaining = ready_at - now;
                return Err(AttendanceError::BreakCooldownActive {
                    remaining_minutes: (remaining.num_seconds() + 59) / 60,
                });
            }
        }

        let outcome = if policy.requires_approval {
            let request = tx
                .insert_break_request(NewBreakRequest {
                    session_id: session.id,
                    agent_id,
                    break_type,
                    requested_minutes,
                    status: BreakRequestStatus::Pending,
                    reason,
                    requested_at: now,
                    started_at: None,
                })
                .await?;

            tx.append_activity(NewActivityEntry {
                agent_id,
                session_id: Some(session.id),
                action: ActivityKind::BreakRequested,
                details: json!({
                    "request_id": request.id,
                    "break_type": break_type,
                    "requested_minutes": requested_minutes,
                }),
                recorded_at: now,
            })
            .await?;

            BreakRequestOutcome {
                request,
                requires_approval: true,
            }
        } else {
            let request = tx
                .insert_break_request(NewBreakRequest {
                    session_id: session.id,
                    agent_id,
                    break_type,
                    requested_minutes,
                    status: BreakRequestStatus::Active,
                    reason,
                    requested_at: now,
                    started_at: Some(now),
                })
                .await?;

            tx.transition_session(
                session.id,
                SessionStatus::Active,
                SessionPatch {
                    status: Some(SessionStatus::OnBreak),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AttendanceError::BreakAlreadyActive)?;

            tx.append_activity(NewActivityEntry {
                agent_id,
                session_id: Some(session.id),
                action: ActivityKind::BreakRequested,
                details: json!({
                    "request_id": request.id,
                    "break_type": break_type,
                    "requested_minutes": requested_minutes,
                }),
                recorded_at: now,
            })
            .await?;
            tx.append_activity(NewActivityEntry {
                agent_id,
                session_id: Some(session.id),
                action: ActivityKind::BreakStarted,
                details: json!({ "request_id": request.id }),
                recorded_at: now,
            })
            .await?;

            BreakRequestOutcome {
                request,
                requires_approval: false,
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Finish the running break: stamps the actual duration, folds it into
    /// the session's accumulated break minutes, and resumes the session.
    pub async fn end_break(&self, agent_id: Uuid) -> Result<EndBreakOutcome> {
        self.agent(agent_id).await?;

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let session = tx
            .find_current_session(agent_id)
            .await?
            .ok_or(AttendanceError::NoActiveSession)?;

        if session.status != SessionStatus::OnBreak {
            // A pending request means the break never started.
            if tx.find_pending_break(session.id).await?.is_some() {
                return Err(AttendanceError::BreakNotApproved);
            }
            return Err(AttendanceError::NoActiveBreak);
        }

        let active = tx
            .find_active_break(session.id)
            .await?
            .ok_or(AttendanceError::NoActiveBreak)?;
        let started_at = active.started_at.unwrap_or(active.requested_at);
        let actual_minutes = minutes_between(started_at, now).max(0) as i32;

        let request = tx
            .transition_break(
                active.id,
                BreakRequestStatus::Active,
                BreakPatch {
                    status: Some(BreakRequestStatus::Ended),
                    actual_minutes: Some(actual_minutes),
                    ended_at: Some(now),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AttendanceError::NoActiveBreak)?;

        tx.transition_session(
            session.id,
            SessionStatus::OnBreak,
            SessionPatch {
                status: Some(SessionStatus::Active),
                add_break_minutes: Some(actual_minutes),
                ..Default::default()
            },
        )
        .await?
        .ok_or(AttendanceError::NoActiveBreak)?;

        tx.append_activity(NewActivityEntry {
            agent_id,
            session_id: Some(session.id),
            action: ActivityKind::BreakEnded,
            details: json!({
                "request_id": request.id,
                "actual_minutes": actual_minutes,
            }),
            recorded_at: now,
        })
        .await?;
        tx.commit().await?;

        Ok(EndBreakOutcome {
            request,
            actual_minutes,
        })
    }

    /// Approve a pending break request, starting the break on the spot.
    pub async fn approve_break(
        &self,
        request_id: Uuid,
        decided_by: Uuid,
        notes: Option<String>,
    ) -> Result<ApproveBreakOutcome> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let request = tx
            .find_break_request(request_id)
            .await?
            .ok_or(AttendanceError::BreakRequestNotFound)?;
        if request.status != BreakRequestStatus::Pending {
            return Err(AttendanceError::BreakNotPending);
        }

        let session = tx
            .find_session(request.session_id)
            .await?
            .ok_or(AttendanceError::SessionNotFound)?;
        match session.status {
            SessionStatus::Active => {}
            SessionStatus::OnBreak => return Err(AttendanceError::AlreadyOnBreak),
            _ => return Err(AttendanceError::NoActiveSession),
        }

        let request = tx
            .transition_break(
                request_id,
                BreakRequestStatus::Pending,
                BreakPatch {
                    status: Some(BreakRequestStatus::Active),
                    started_at: Some(now),
                    decided_at: Some(now),
                    decided_by: Some(decided_by),
                    decision_notes: notes,
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AttendanceError::BreakNotPending)?;

        let session = tx
            .transition_session(
                session.id,
                SessionStatus::Active,
                SessionPatch {
                    status: Some(SessionStatus::OnBreak),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AttendanceError::AlreadyOnBreak)?;

        tx.append_activity(NewActivityEntry {
            agent_id: request.agent_id,
            session_id: Some(session.id),
            action: ActivityKind::BreakApproved,
            details: json!({
                "request_id": request.id,
                "decided_by": decided_by,
            }),
            recorded_at: now,
        })
        .await?;
        tx.commit().await?;

        info!(request = %request.id, approver = %decided_by, "break approved");

        Ok(ApproveBreakOutcome { request, session })
    }

    /// Reject a pending break request. The session keeps running; a reason
    /// is mandatory.
    pub async fn reject_break(
        &self,
        request_id: Uuid,
        decided_by: Uuid,
        reason: &str,
    ) -> Result<RejectBreakOutcome> {
        if reason.trim().is_empty() {
            return Err(AttendanceError::RejectionReasonRequired);
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let request = tx
            .find_break_request(request_id)
            .await?
            .ok_or(AttendanceError::BreakRequestNotFound)?;
        if request.status != BreakRequestStatus::Pending {
            return Err(AttendanceError::BreakNotPending);
        }

        let request = tx
            .transition_break(
                request_id,
                BreakRequestStatus::Pending,
                BreakPatch {
                    status: Some(BreakRequestStatus::Rejected),
                    decided_at: Some(now),
                    decided_by: Some(decided_by),
                    decision_notes: Some(reason.trim().to_string()),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AttendanceError::BreakNotPending)?;

        tx.append_activity(NewActivityEntry {
            agent_id: request.agent_id,
            session_id: Some(request.session_id),
            action: ActivityKind::BreakRejected,
            details: json!({
                "request_id": request.id,
                "decided_by": decided_by,
                "reason": request.decision_notes,
            }),
            recorded_at: now,
        })
        .await?;
        tx.commit().await?;

        info!(request = %request.id, approver = %decided_by, "break rejected");

        Ok(RejectBreakOutcome { request })
    }

    /// Fetch a session snapshot, enforcing ownership: agents see only their
    /// own sessions, admins see all.
    pub async fn session_snapshot(
        &self,
        viewer_id: Uuid,
        viewer_is_admin: bool,
        session_id: Uuid,
    ) -> Result<AgentSession> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or(AttendanceError::SessionNotFound)?;
        if session.agent_id != viewer_id && !viewer_is_admin {
            return Err(AttendanceError::NotYourSession);
        }
        Ok(session)
    }

    /// Today's session for the calling agent, if any.
    pub async fn today(&self, agent_id: Uuid) -> Result<Option<AgentSession>> {
        let today = self.clock.work_date();
        Ok(self.store.session_for_day(agent_id, today).await?)
    }

    /// Close out sessions left open from days before `before`, marking them
    /// `incomplete`. A dangling active break is ended at its requested
    /// duration, the best estimate available once the agent is gone. Run by
    /// an external periodic job or the `reconcile` CLI command.
    pub async fn reconcile_abandoned(&self, before: NaiveDate) -> Result<ReconcileOutcome> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let mut session_ids = Vec::new();
        for session in tx.open_sessions_before(before).await? {
            let mut add_break_minutes = None;

            if session.status == SessionStatus::OnBreak {
                if let Some(active) = tx.find_active_break(session.id).await? {
                    let started_at = active.started_at.unwrap_or(active.requested_at);
                    let assumed = active.requested_minutes;
                    tx.transition_break(
                        active.id,
                        BreakRequestStatus::Active,
                        BreakPatch {
                            status: Some(BreakRequestStatus::Ended),
                            actual_minutes: Some(assumed),
                            ended_at: Some(started_at + Duration::minutes(assumed as i64)),
                            ..Default::default()
                        },
                    )
                    .await?;
                    add_break_minutes = Some(assumed);
                }
            }

            let updated = tx
                .transition_session(
                    session.id,
                    session.status,
                    SessionPatch {
                        status: Some(SessionStatus::Incomplete),
                        add_break_minutes,
                        ..Default::default()
                    },
                )
                .await?;

            if let Some(updated) = updated {
                tx.append_activity(NewActivityEntry {
                    agent_id: updated.agent_id,
                    session_id: Some(updated.id),
                    action: ActivityKind::SessionReconciled,
                    details: json!({
                        "work_date": updated.work_date,
                        "previous_status": session.status,
                    }),
                    recorded_at: now,
                })
                .await?;
                session_ids.push(updated.id);
            }
        }

        tx.commit().await?;

        info!(count = session_ids.len(), "reconciled abandoned sessions");

        Ok(ReconcileOutcome { session_ids })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;
    use sqlx::types::Json;

    use super::*;
    use crate::clock::ManualClock;
    use crate::database::models::{
        Agent, AgentRole, BreakPolicy, BreakRules, DurationLimits,
    };
    use crate::store::MemoryAttendanceStore;

    struct Fixture {
        store: Arc<MemoryAttendanceStore>,
        clock: Arc<ManualClock>,
        agent_id: Uuid,
        service: AttendanceService,
    }

    impl Fixture {
        async fn new() -> Self {
            Self::with_config(AttendanceConfig {
                allow_recheck_in: false,
                late_checkin_cutoff_minutes: None,
            })
            .await
        }

        async fn with_config(config: AttendanceConfig) -> Self {
            Self::build(config, false).await
        }

        async fn with_approval_policy() -> Self {
            Self::build(
                AttendanceConfig {
                    allow_recheck_in: false,
                    late_checkin_cutoff_minutes: None,
                },
                true,
            )
            .await
        }

        async fn build(config: AttendanceConfig, requires_approval: bool) -> Self {
            let clock = Arc::new(ManualClock::at("2024-03-11T09:00:00Z"));
            let store = Arc::new(MemoryAttendanceStore::new(clock.clone()));

            let policy_id = Uuid::new_v4();
            let shift_id = Uuid::new_v4();
            let agent_id = Uuid::new_v4();
            let now = Utc::now();

            store
                .seed_policy(BreakPolicy {
                    id: policy_id,
                    name: "standard".to_string(),
                    max_breaks_per_day: 2,
                    cooldown_minutes: 30,
                    requires_approval,
                    rules: Json(BreakRules {
                        allowed_types: vec![BreakType::Short, BreakType::Lunch],
                        limits: HashMap::from([
                            (BreakType::Short, DurationLimits { min_minutes: 5, max_minutes: 15 }),
                            (BreakType::Lunch, DurationLimits { min_minutes: 30, max_minutes: 60 }),
                        ]),
                        preferred_window: None,
                    }),
                    created_at: now,
                    updated_at: now,
                })
                .await;

            store
                .seed_shift(Shift {
                    id: shift_id,
                    name: "morning".to_string(),
                    start_time: "09:00:00".parse().unwrap(),
                    end_time: "17:00:00".parse().unwrap(),
                    grace_period_minutes: 10,
                    overtime_allowed: false,
                    overtime_requires_approval: false,
                    break_policy_id: policy_id,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                })
                .await;

            store
                .seed_agent(Agent {
                    id: agent_id,
                    name: "Ada".to_string(),
                    email: "ada@example.com".to_string(),
                    role: AgentRole::Agent,
                    shift_id: Some(shift_id),
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                })
                .await;

            let service = AttendanceService::new(
                store.clone(),
                store.clone(),
                clock.clone(),
                config,
            );

            Fixture {
                store,
                clock,
                agent_id,
                service,
            }
        }
    }

    #[tokio::test]
    async fn check_in_at_grace_boundary_is_on_time() {
        let f = Fixture::new().await;
        f.clock.set("2024-03-11T09:10:00Z".parse().unwrap());

        let outcome = f.service.check_in(f.agent_id, None, None).await.unwrap();
        assert_eq!(outcome.punctuality, Punctuality::OnTime);
        assert_eq!(outcome.late_minutes, 0);
    }

    #[tokio::test]
    async fn check_in_past_grace_counts_from_grace_end() {
        let f = Fixture::new().await;
        f.clock.set("2024-03-11T09:25:00Z".parse().unwrap());

        let outcome = f.service.check_in(f.agent_id, None, None).await.unwrap();
        assert_eq!(outcome.punctuality, Punctuality::Late);
        assert_eq!(outcome.late_minutes, 15);
    }

    #[tokio::test]
    async fn late_checkin_cutoff_rejects() {
        let f = Fixture::with_config(AttendanceConfig {
            allow_recheck_in: false,
            late_checkin_cutoff_minutes: Some(120),
        })
        .await;
        f.clock.set("2024-03-11T11:30:00Z".parse().unwrap());

        let err = f.service.check_in(f.agent_id, None, None).await.unwrap_err();
        assert!(matches!(err, AttendanceError::TooLateToCheckIn { late_minutes: 140 }));
    }

    #[tokio::test]
    async fn recheck_in_is_policy_gated() {
        let f = Fixture::new().await;
        f.service.check_in(f.agent_id, None, None).await.unwrap();
        f.clock.advance_minutes(240);
        f.service.check_out(f.agent_id, None, None).await.unwrap();

        let err = f.service.check_in(f.agent_id, None, None).await.unwrap_err();
        assert!(matches!(err, AttendanceError::AlreadyCheckedOut));

        let g = Fixture::with_config(AttendanceConfig {
            allow_recheck_in: true,
            late_checkin_cutoff_minutes: None,
        })
        .await;
        g.service.check_in(g.agent_id, None, None).await.unwrap();
        g.clock.advance_minutes(240);
        let first = g.service.check_out(g.agent_id, None, None).await.unwrap();
        g.clock.advance_minutes(60);
        let reopened = g.service.check_in(g.agent_id, None, None).await.unwrap();

        assert_eq!(reopened.session.id, first.session.id);
        assert_eq!(reopened.session.status, SessionStatus::Active);
        assert_eq!(reopened.session.check_in_at, first.session.check_in_at);
    }

    #[tokio::test]
    async fn end_break_on_pending_request_is_not_approved() {
        let f = Fixture::with_approval_policy().await;
        f.service.check_in(f.agent_id, None, None).await.unwrap();
        f.clock.advance_minutes(60);

        let outcome = f
            .service
            .request_break(f.agent_id, BreakType::Short, 10, None)
            .await
            .unwrap();
        assert!(outcome.requires_approval);

        let err = f.service.end_break(f.agent_id).await.unwrap_err();
        assert!(matches!(err, AttendanceError::BreakNotApproved));
    }

    #[tokio::test]
    async fn failed_request_leaves_no_partial_state() {
        let f = Fixture::new().await;
        f.service.check_in(f.agent_id, None, None).await.unwrap();
        f.clock.advance_minutes(60);

        let err = f
            .service
            .request_break(f.agent_id, BreakType::Short, 3, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::BreakTooShort { min_minutes: 5 }));

        let session = f.service.today(f.agent_id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert!(f.store.breaks_for_session(session.id).await.is_empty());
    }

    #[tokio::test]
    async fn reconcile_closes_stale_sessions_and_dangling_breaks() {
        let f = Fixture::new().await;
        f.service.check_in(f.agent_id, None, None).await.unwrap();
        f.clock.advance_minutes(120);
        f.service
            .request_break(f.agent_id, BreakType::Lunch, 30, None)
            .await
            .unwrap();

        // Agent vanishes; the next day the sweep runs.
        f.clock.set("2024-03-12T06:00:00Z".parse().unwrap());
        let outcome = f
            .service
            .reconcile_abandoned(f.clock.work_date())
            .await
            .unwrap();
        assert_eq!(outcome.session_ids.len(), 1);

        let session = f
            .store
            .get_session(outcome.session_ids[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.status, SessionStatus::Incomplete);
        // Dangling lunch closed at its requested 30 minutes.
        assert_eq!(session.break_minutes, 30);

        let actions: Vec<_> = f
            .store
            .activity()
            .await
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert!(actions.contains(&ActivityKind::SessionReconciled));
    }
}

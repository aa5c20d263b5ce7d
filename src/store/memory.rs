use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::clock::Clock;
use crate::database::models::{
    ActivityLogEntry, Agent, AgentSession, BreakPolicy, BreakRequest, BreakRequestStatus,
    SessionStatus, Shift,
};

use super::{
    AttendanceStore, AttendanceTx, BreakPatch, NewActivityEntry, NewBreakRequest, NewSession,
    SessionPatch, ShiftProvider, StoreError,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    agents: HashMap<Uuid, Agent>,
    shifts: HashMap<Uuid, Shift>,
    policies: HashMap<Uuid, BreakPolicy>,
    sessions: HashMap<Uuid, AgentSession>,
    breaks: HashMap<Uuid, BreakRequest>,
    activity: Vec<ActivityLogEntry>,
}

/// In-process store used by the test suites and local development. A
/// transaction takes the state lock and works on a scratch copy; commit
/// swaps the copy in, drop discards it. Holding the lock for the length of
/// the transaction also serializes writers, which is the same ordering
/// guarantee the Postgres row locks give.
pub struct MemoryAttendanceStore {
    state: Arc<Mutex<MemoryState>>,
    clock: Arc<dyn Clock>,
}

impl MemoryAttendanceStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            clock,
        }
    }

    pub async fn seed_agent(&self, agent: Agent) {
        self.state.lock().await.agents.insert(agent.id, agent);
    }

    pub async fn seed_shift(&self, shift: Shift) {
        self.state.lock().await.shifts.insert(shift.id, shift);
    }

    pub async fn seed_policy(&self, policy: BreakPolicy) {
        self.state.lock().await.policies.insert(policy.id, policy);
    }

    /// All activity entries, oldest first. Test helper.
    pub async fn activity(&self) -> Vec<ActivityLogEntry> {
        self.state.lock().await.activity.clone()
    }

    /// All break requests for a session. Test helper.
    pub async fn breaks_for_session(&self, session_id: Uuid) -> Vec<BreakRequest> {
        let mut requests: Vec<BreakRequest> = self
            .state
            .lock()
            .await
            .breaks
            .values()
            .filter(|b| b.session_id == session_id)
            .cloned()
            .collect();
        requests.sort_by_key(|b| b.requested_at);
        requests
    }
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn begin(&self) -> Result<Box<dyn AttendanceTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let scratch = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            scratch,
            clock: self.clock.clone(),
        }))
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<AgentSession>, StoreError> {
        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }

    async fn session_for_day(
        &self,
        agent_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<AgentSession>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .values()
            .find(|s| s.agent_id == agent_id && s.work_date == day)
            .cloned())
    }

    async fn recent_activity(
        &self,
        agent_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let state = self.state.lock().await;
        let mut entries: Vec<ActivityLogEntry> = state
            .activity
            .iter()
            .filter(|e| e.agent_id == agent_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }
}

#[async_trait]
impl ShiftProvider for MemoryAttendanceStore {
    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.agents.get(&id).filter(|a| a.is_active).cloned())
    }

    async fn get_shift(&self, id: Uuid) -> Result<Option<Shift>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.shifts.get(&id).filter(|s| s.is_active).cloned())
    }

    async fn get_break_policy(&self, id: Uuid) -> Result<Option<BreakPolicy>, StoreError> {
        Ok(self.state.lock().await.policies.get(&id).cloned())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    scratch: MemoryState,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl AttendanceTx for MemoryTx {
    async fn find_session(&mut self, id: Uuid) -> Result<Option<AgentSession>, StoreError> {
        Ok(self.scratch.sessions.get(&id).cloned())
    }

    async fn find_session_for_day(
        &mut self,
        agent_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<AgentSession>, StoreError> {
        Ok(self
            .scratch
            .sessions
            .values()
            .find(|s| s.agent_id == agent_id && s.work_date == day)
            .cloned())
    }

    async fn find_current_session(
        &mut self,
        agent_id: Uuid,
    ) -> Result<Option<AgentSession>, StoreError> {
        Ok(self
            .scratch
            .sessions
            .values()
            .filter(|s| s.agent_id == agent_id && s.is_open())
            .max_by_key(|s| s.work_date)
            .cloned())
    }

    async fn insert_session(&mut self, session: NewSession) -> Result<AgentSession, StoreError> {
        let exists = self
            .scratch
            .sessions
            .values()
            .any(|s| s.agent_id == session.agent_id && s.work_date == session.work_date);
        if exists {
            return Err(StoreError::Duplicate("agent_sessions(agent_id, work_date)"));
        }

        let now = self.clock.now();
        let row = AgentSession {
            id: Uuid::new_v4(),
            agent_id: session.agent_id,
            work_date: session.work_date,
            shift_id: session.shift_id,
            check_in_at: session.check_in_at,
            check_out_at: None,
            check_in_ip: session.check_in_ip,
            check_in_location: session.check_in_location,
            check_out_ip: None,
            break_minutes: 0,
            late_minutes: session.late_minutes,
            status: session.status,
            created_at: now,
            updated_at: now,
        };
        self.scratch.sessions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn transition_session(
        &mut self,
        id: Uuid,
        expected: SessionStatus,
        patch: SessionPatch,
    ) -> Result<Option<AgentSession>, StoreError> {
        let now = self.clock.now();
        let Some(row) = self.scratch.sessions.get_mut(&id) else {
            return Ok(None);
        };
        if row.status != expected {
            return Ok(None);
        }

        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(ts) = patch.check_in_at {
            row.check_in_at = Some(ts);
        }
        if let Some(ip) = patch.check_in_ip {
            row.check_in_ip = Some(ip);
        }
        if let Some(loc) = patch.check_in_location {
            row.check_in_location = Some(loc);
        }
        if let Some(ts) = patch.check_out_at {
            row.check_out_at = Some(ts);
        }
        if let Some(ip) = patch.check_out_ip {
            row.check_out_ip = Some(ip);
        }
        if let Some(late) = patch.late_minutes {
            row.late_minutes = late;
        }
        if let Some(add) = patch.add_break_minutes {
            row.break_minutes += add;
        }
        row.updated_at = now;
        Ok(Some(row.clone()))
    }

    async fn open_sessions_before(
        &mut self,
        day: NaiveDate,
    ) -> Result<Vec<AgentSession>, StoreError> {
        let mut sessions: Vec<AgentSession> = self
            .scratch
            .sessions
            .values()
            .filter(|s| s.work_date < day && s.is_open())
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.work_date);
        Ok(sessions)
    }

    async fn insert_break_request(
        &mut self,
        request: NewBreakRequest,
    ) -> Result<BreakRequest, StoreError> {
        let row = BreakRequest {
            id: Uuid::new_v4(),
            session_id: request.session_id,
            agent_id: request.agent_id,
            break_type: request.break_type,
            requested_minutes: request.requested_minutes,
            actual_minutes: None,
            status: request.status,
            reason: request.reason,
            decision_notes: None,
            requested_at: request.requested_at,
            started_at: request.started_at,
            ended_at: None,
            decided_at: None,
            decided_by: None,
        };
        self.scratch.breaks.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_break_request(&mut self, id: Uuid) -> Result<Option<BreakRequest>, StoreError> {
        Ok(self.scratch.breaks.get(&id).cloned())
    }

    async fn find_active_break(
        &mut self,
        session_id: Uuid,
    ) -> Result<Option<BreakRequest>, StoreError> {
        Ok(self
            .scratch
            .breaks
            .values()
            .find(|b| b.session_id == session_id && b.status == BreakRequestStatus::Active)
            .cloned())
    }

    async fn find_pending_break(
        &mut self,
        session_id: Uuid,
    ) -> Result<Option<BreakRequest>, StoreError> {
        Ok(self
            .scratch
            .breaks
            .values()
            .filter(|b| b.session_id == session_id && b.status == BreakRequestStatus::Pending)
            .max_by_key(|b| b.requested_at)
            .cloned())
    }

    async fn count_breaks(&mut self, session_id: Uuid) -> Result<i64, StoreError> {
        Ok(self
            .scratch
            .breaks
            .values()
            .filter(|b| b.session_id == session_id && b.status != BreakRequestStatus::Rejected)
            .count() as i64)
    }

    async fn last_break_end(
        &mut self,
        session_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .scratch
            .breaks
            .values()
            .filter(|b| b.session_id == session_id && b.status == BreakRequestStatus::Ended)
            .filter_map(|b| b.ended_at)
            .max())
    }

    async fn transition_break(
        &mut self,
        id: Uuid,
        expected: BreakRequestStatus,
        patch: BreakPatch,
    ) -> Result<Option<BreakRequest>, StoreError> {
        let Some(row) = self.scratch.breaks.get_mut(&id) else {
            return Ok(None);
        };
        if row.status != expected {
            return Ok(None);
        }

        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(minutes) = patch.actual_minutes {
            row.actual_minutes = Some(minutes);
        }
        if let Some(ts) = patch.started_at {
            row.started_at = Some(ts);
        }
        if let Some(ts) = patch.ended_at {
            row.ended_at = Some(ts);
        }
        if let Some(ts) = patch.decided_at {
            row.decided_at = Some(ts);
        }
        if let Some(who) = patch.decided_by {
            row.decided_by = Some(who);
        }
        if let Some(notes) = patch.decision_notes {
            row.decision_notes = Some(notes);
        }
        Ok(Some(row.clone()))
    }

    async fn append_activity(&mut self, entry: NewActivityEntry) -> Result<(), StoreError> {
        self.scratch.activity.push(ActivityLogEntry {
            id: Uuid::new_v4(),
            agent_id: entry.agent_id,
            session_id: entry.session_id,
            action: entry.action,
            details: Json(entry.details),
            recorded_at: entry.recorded_at,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, scratch, .. } = *self;
        *guard = scratch;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::clock::ManualClock;

    fn new_session(agent_id: Uuid, day: &str) -> NewSession {
        NewSession {
            agent_id,
            work_date: day.parse::<NaiveDate>().unwrap(),
            shift_id: Uuid::new_v4(),
            status: SessionStatus::Active,
            check_in_at: None,
            check_in_ip: None,
            check_in_location: None,
            late_minutes: 0,
        }
    }

    fn store() -> MemoryAttendanceStore {
        MemoryAttendanceStore::new(Arc::new(ManualClock::at("2024-03-11T09:00:00Z")))
    }

    #[tokio::test]
    async fn duplicate_day_insert_is_rejected() {
        let store = store();
        let agent_id = Uuid::new_v4();

        let mut tx = store.begin().await.unwrap();
        tx.insert_session(new_session(agent_id, "2024-03-11")).await.unwrap();
        let err = tx
            .insert_session(new_session(agent_id, "2024-03-11"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        // A different day is fine.
        tx.insert_session(new_session(agent_id, "2024-03-12")).await.unwrap();
    }

    #[tokio::test]
    async fn transition_guard_rejects_stale_expectations() {
        let store = store();
        let mut tx = store.begin().await.unwrap();
        let session = tx
            .insert_session(new_session(Uuid::new_v4(), "2024-03-11"))
            .await
            .unwrap();

        let updated = tx
            .transition_session(
                session.id,
                SessionStatus::OnBreak, // actually Active
                SessionPatch {
                    status: Some(SessionStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_none());

        let updated = tx
            .transition_session(
                session.id,
                SessionStatus::Active,
                SessionPatch {
                    status: Some(SessionStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.unwrap().status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = store();
        let agent_id = Uuid::new_v4();

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_session(new_session(agent_id, "2024-03-11")).await.unwrap();
            // No commit.
        }

        let day = "2024-03-11".parse().unwrap();
        assert!(store.session_for_day(agent_id, day).await.unwrap().is_none());

        let mut tx = store.begin().await.unwrap();
        let session = tx.insert_session(new_session(agent_id, "2024-03-11")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            store.session_for_day(agent_id, day).await.unwrap().unwrap().id,
            session.id
        );
    }
}

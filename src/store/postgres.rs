use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::models::{
    ActivityLogEntry, Agent, AgentSession, BreakPolicy, BreakRequest, BreakRequestStatus,
    SessionStatus, Shift,
};

use super::{
    AttendanceStore, AttendanceTx, BreakPatch, NewActivityEntry, NewBreakRequest, NewSession,
    SessionPatch, ShiftProvider, StoreError,
};

/// Production store backed by Postgres. Each state-machine action runs in
/// one transaction; uniqueness and the status guards on UPDATE are the
/// enforcement points for the concurrency rules, so multiple service
/// instances can share the database safely.
#[derive(Clone)]
pub struct PgAttendanceStore {
    pool: PgPool,
}

impl PgAttendanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_insert_err(err: sqlx::Error, constraint: &'static str) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() {
            return StoreError::Duplicate(constraint);
        }
    }
    StoreError::Sqlx(err)
}

#[async_trait]
impl AttendanceStore for PgAttendanceStore {
    async fn begin(&self) -> Result<Box<dyn AttendanceTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgAttendanceTx { tx }))
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<AgentSession>, StoreError> {
        let session = sqlx::query_as::<_, AgentSession>(
            "SELECT * FROM agent_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn session_for_day(
        &self,
        agent_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<AgentSession>, StoreError> {
        let session = sqlx::query_as::<_, AgentSession>(
            "SELECT * FROM agent_sessions WHERE agent_id = $1 AND work_date = $2",
        )
        .bind(agent_id)
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn recent_activity(
        &self,
        agent_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let entries = sqlx::query_as::<_, ActivityLogEntry>(
            "SELECT * FROM activity_log WHERE agent_id = $1 ORDER BY recorded_at DESC LIMIT $2",
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

#[async_trait]
impl ShiftProvider for PgAttendanceStore {
    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>, StoreError> {
        let agent = sqlx::query_as::<_, Agent>(
            "SELECT * FROM agents WHERE id = $1 AND is_active",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(agent)
    }

    async fn get_shift(&self, id: Uuid) -> Result<Option<Shift>, StoreError> {
        let shift = sqlx::query_as::<_, Shift>(
            "SELECT * FROM shifts WHERE id = $1 AND is_active",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(shift)
    }

    async fn get_break_policy(&self, id: Uuid) -> Result<Option<BreakPolicy>, StoreError> {
        let policy = sqlx::query_as::<_, BreakPolicy>(
            "SELECT * FROM break_policies WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(policy)
    }
}

struct PgAttendanceTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AttendanceTx for PgAttendanceTx {
    async fn find_session(&mut self, id: Uuid) -> Result<Option<AgentSession>, StoreError> {
        let session = sqlx::query_as::<_, AgentSession>(
            "SELECT * FROM agent_sessions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(session)
    }

    async fn find_session_for_day(
        &mut self,
        agent_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<AgentSession>, StoreError> {
        let session = sqlx::query_as::<_, AgentSession>(
            "SELECT * FROM agent_sessions WHERE agent_id = $1 AND work_date = $2 FOR UPDATE",
        )
        .bind(agent_id)
        .bind(day)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(session)
    }

    async fn find_current_session(
        &mut self,
        agent_id: Uuid,
    ) -> Result<Option<AgentSession>, StoreError> {
        let session = sqlx::query_as::<_, AgentSession>(
            "SELECT * FROM agent_sessions \
             WHERE agent_id = $1 AND status IN ('active', 'on_break') \
             ORDER BY work_date DESC LIMIT 1 FOR UPDATE",
        )
        .bind(agent_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(session)
    }

    async fn insert_session(&mut self, session: NewSession) -> Result<AgentSession, StoreError> {
        sqlx::query_as::<_, AgentSession>(
            "INSERT INTO agent_sessions \
               (id, agent_id, work_date, shift_id, status, check_in_at, \
                check_in_ip, check_in_location, late_minutes, break_minutes, \
                created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, now(), now()) \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(session.agent_id)
        .bind(session.work_date)
        .bind(session.shift_id)
        .bind(session.status)
        .bind(session.check_in_at)
        .bind(session.check_in_ip)
        .bind(session.check_in_location)
        .bind(session.late_minutes)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_insert_err(e, "agent_sessions(agent_id, work_date)"))
    }

    async fn transition_session(
        &mut self,
        id: Uuid,
        expected: SessionStatus,
        patch: SessionPatch,
    ) -> Result<Option<AgentSession>, StoreError> {
        let session = sqlx::query_as::<_, AgentSession>(
            "UPDATE agent_sessions SET \
               status = COALESCE($3, status), \
               check_in_at = COALESCE($4, check_in_at), \
               check_in_ip = COALESCE($5, check_in_ip), \
               check_in_location = COALESCE($6, check_in_location), \
               check_out_at = COALESCE($7, check_out_at), \
               check_out_ip = COALESCE($8, check_out_ip), \
               late_minutes = COALESCE($9, late_minutes), \
               break_minutes = break_minutes + COALESCE($10, 0), \
               updated_at = now() \
             WHERE id = $1 AND status = $2 \
             RETURNING *",
        )
        .bind(id)
        .bind(expected)
        .bind(patch.status)
        .bind(patch.check_in_at)
        .bind(patch.check_in_ip)
        .bind(patch.check_in_location)
        .bind(patch.check_out_at)
        .bind(patch.check_out_ip)
        .bind(patch.late_minutes)
        .bind(patch.add_break_minutes)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(session)
    }

    async fn open_sessions_before(
        &mut self,
        day: NaiveDate,
    ) -> Result<Vec<AgentSession>, StoreError> {
        let sessions = sqlx::query_as::<_, AgentSession>(
            "SELECT * FROM agent_sessions \
             WHERE work_date < $1 AND status IN ('active', 'on_break') \
             ORDER BY work_date FOR UPDATE",
        )
        .bind(day)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(sessions)
    }

    async fn insert_break_request(
        &mut self,
        request: NewBreakRequest,
    ) -> Result<BreakRequest, StoreError> {
        sqlx::query_as::<_, BreakRequest>(
            "INSERT INTO break_requests \
               (id, session_id, agent_id, break_type, requested_minutes, \
                status, reason, requested_at, started_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(request.session_id)
        .bind(request.agent_id)
        .bind(request.break_type)
        .bind(request.requested_minutes)
        .bind(request.status)
        .bind(request.reason)
        .bind(request.requested_at)
        .bind(request.started_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_insert_err(e, "break_requests(id)"))
    }

    async fn find_break_request(&mut self, id: Uuid) -> Result<Option<BreakRequest>, StoreError> {
        let request = sqlx::query_as::<_, BreakRequest>(
            "SELECT * FROM break_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(request)
    }

    async fn find_active_break(
        &mut self,
        session_id: Uuid,
    ) -> Result<Option<BreakRequest>, StoreError> {
        let request = sqlx::query_as::<_, BreakRequest>(
            "SELECT * FROM break_requests \
             WHERE session_id = $1 AND status = 'active' LIMIT 1 FOR UPDATE",
        )
        .bind(session_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(request)
    }

    async fn find_pending_break(
        &mut self,
        session_id: Uuid,
    ) -> Result<Option<BreakRequest>, StoreError> {
        let request = sqlx::query_as::<_, BreakRequest>(
            "SELECT * FROM break_requests \
             WHERE session_id = $1 AND status = 'pending' \
             ORDER BY requested_at DESC LIMIT 1 FOR UPDATE",
        )
        .bind(session_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(request)
    }

    async fn count_breaks(&mut self, session_id: Uuid) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM break_requests \
             WHERE session_id = $1 AND status <> 'rejected'",
        )
        .bind(session_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count.0)
    }

    async fn last_break_end(
        &mut self,
        session_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let max: (Option<DateTime<Utc>>,) = sqlx::query_as(
            "SELECT MAX(ended_at) FROM break_requests \
             WHERE session_id = $1 AND status = 'ended'",
        )
        .bind(session_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(max.0)
    }

    async fn transition_break(
        &mut self,
        id: Uuid,
        expected: BreakRequestStatus,
        patch: BreakPatch,
    ) -> Result<Option<BreakRequest>, StoreError> {
        let request = sqlx::query_as::<_, BreakRequest>(
            "UPDATE break_requests SET \
               status = COALESCE($3, status), \
               actual_minutes = COALESCE($4, actual_minutes), \
               started_at = COALESCE($5, started_at), \
               ended_at = COALESCE($6, ended_at), \
               decided_at = COALESCE($7, decided_at), \
               decided_by = COALESCE($8, decided_by), \
               decision_notes = COALESCE($9, decision_notes) \
             WHERE id = $1 AND status = $2 \
             RETURNING *",
        )
        .bind(id)
        .bind(expected)
        .bind(patch.status)
        .bind(patch.actual_minutes)
        .bind(patch.started_at)
        .bind(patch.ended_at)
        .bind(patch.decided_at)
        .bind(patch.decided_by)
        .bind(patch.decision_notes)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(request)
    }

    async fn append_activity(&mut self, entry: NewActivityEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO activity_log \
               (id, agent_id, session_id, action, details, recorded_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(entry.agent_id)
        .bind(entry.session_id)
        .bind(entry.action)
        .bind(Json(entry.details))
        .bind(entry.recorded_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

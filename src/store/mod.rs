pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{
    ActivityKind, ActivityLogEntry, Agent, AgentSession, BreakPolicy, BreakRequest,
    BreakRequestStatus, BreakType, SessionStatus, Shift,
};

pub use memory::MemoryAttendanceStore;
pub use postgres::PgAttendanceStore;

/// Storage-layer failures. `Duplicate` and the `None` results of the CAS
/// transitions are how races surface to the state machine; everything else
/// propagates as an internal error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate record: {0}")]
    Duplicate(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Insert shape for a session row. The store assigns the id and the
/// bookkeeping timestamps.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub agent_id: Uuid,
    pub work_date: NaiveDate,
    pub shift_id: Uuid,
    pub status: SessionStatus,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_in_ip: Option<String>,
    pub check_in_location: Option<String>,
    pub late_minutes: i32,
}

/// Field updates applied together with a status CAS. `None` leaves the
/// column untouched; `add_break_minutes` is an increment, never an
/// assignment, so the accumulated total stays monotone.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_in_ip: Option<String>,
    pub check_in_location: Option<String>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub check_out_ip: Option<String>,
    pub late_minutes: Option<i32>,
    pub add_break_minutes: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewBreakRequest {
    pub session_id: Uuid,
    pub agent_id: Uuid,
    pub break_type: BreakType,
    pub requested_minutes: i32,
    pub status: BreakRequestStatus,
    pub reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    /// Present when the request starts immediately (no-approval policies).
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct BreakPatch {
    pub status: Option<BreakRequestStatus>,
    pub actual_minutes: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<Uuid>,
    pub decision_notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewActivityEntry {
    pub agent_id: Uuid,
    pub session_id: Option<Uuid>,
    pub action: ActivityKind,
    pub details: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

/// Entry point the state machine opens a transaction against. Reads that
/// never accompany a write go straight through the store.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn AttendanceTx>, StoreError>;

    async fn get_session(&self, id: Uuid) -> Result<Option<AgentSession>, StoreError>;

    /// Read-only lookup of an agent's session for a given day (no locks).
    async fn session_for_day(
        &self,
        agent_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<AgentSession>, StoreError>;

    async fn recent_activity(
        &self,
        agent_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ActivityLogEntry>, StoreError>;
}

/// One state-machine action's worth of reads and guarded writes. Every
/// mutation either commits as a unit or not at all; the `transition_*`
/// methods return `None` when the expected-status guard no longer holds,
/// which is how concurrent actions lose the race instead of double-applying.
#[async_trait]
pub trait AttendanceTx: Send {
    // --- sessions ---

    async fn find_session(&mut self, id: Uuid) -> Result<Option<AgentSession>, StoreError>;

    async fn find_session_for_day(
        &mut self,
        agent_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<AgentSession>, StoreError>;

    /// The agent's open (active or on-break) session, if any.
    async fn find_current_session(
        &mut self,
        agent_id: Uuid,
    ) -> Result<Option<AgentSession>, StoreError>;

    /// Insert honoring the (agent_id, work_date) uniqueness; a constraint
    /// violation surfaces as [`StoreError::Duplicate`].
    async fn insert_session(&mut self, session: NewSession) -> Result<AgentSession, StoreError>;

    /// Compare-and-set: applies the patch only while the row's status still
    /// equals `expected`, returning the updated row or `None` on a lost race.
    async fn transition_session(
        &mut self,
        id: Uuid,
        expected: SessionStatus,
        patch: SessionPatch,
    ) -> Result<Option<AgentSession>, StoreError>;

    /// Sessions still open from days strictly before `day` (reconciliation).
    async fn open_sessions_before(
        &mut self,
        day: NaiveDate,
    ) -> Result<Vec<AgentSession>, StoreError>;

    // --- break requests ---

    async fn insert_break_request(
        &mut self,
        request: NewBreakRequest,
    ) -> Result<BreakRequest, StoreError>;

    async fn find_break_request(&mut self, id: Uuid) -> Result<Option<BreakRequest>, StoreError>;

    async fn find_active_break(
        &mut self,
        session_id: Uuid,
    ) -> Result<Option<BreakRequest>, StoreError>;

    async fn find_pending_break(
        &mut self,
        session_id: Uuid,
    ) -> Result<Option<BreakRequest>, StoreError>;

    /// Non-rejected requests for the session (pending, active, and ended all
    /// count toward the daily cap).
    async fn count_breaks(&mut self, session_id: Uuid) -> Result<i64, StoreError>;

    /// When the session's most recent ended break finished, for cooldown.
    async fn last_break_end(
        &mut self,
        session_id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn transition_break(
        &mut self,
        id: Uuid,
        expected: BreakRequestStatus,
        patch: BreakPatch,
    ) -> Result<Option<BreakRequest>, StoreError>;

    // --- activity log ---

    async fn append_activity(&mut self, entry: NewActivityEntry) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Read-only directory of agents, shifts, and break policies. The state
/// machine resolves identity and rules through this; it never writes them.
#[async_trait]
pub trait ShiftProvider: Send + Sync {
    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>, StoreError>;

    async fn get_shift(&self, id: Uuid) -> Result<Option<Shift>, StoreError>;

    async fn get_break_policy(&self, id: Uuid) -> Result<Option<BreakPolicy>, StoreError>;
}

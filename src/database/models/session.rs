use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Daily attendance lifecycle. `Incomplete` is only reachable through the
/// reconciliation pass, never from a direct agent action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    Active,
    OnBreak,
    Completed,
    Incomplete,
}

/// One agent's attendance record for one calendar day. Unique per
/// (agent_id, work_date); the database constraint is the source of truth
/// for that, not any in-process check.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentSession {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub work_date: NaiveDate,
    pub shift_id: Uuid,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub check_in_ip: Option<String>,
    pub check_in_location: Option<String>,
    pub check_out_ip: Option<String>,
    /// Sum of actual minutes over this session's ended breaks.
    pub break_minutes: i32,
    /// Minutes past shift start + grace at check-in; 0 when on time.
    pub late_minutes: i32,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentSession {
    /// Whether the agent is currently clocked in (active or on break).
    pub fn is_open(&self) -> bool {
        matches!(self.status, SessionStatus::Active | SessionStatus::OnBreak)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ActivityKind {
    CheckIn,
    CheckOut,
    BreakRequested,
    BreakStarted,
    BreakEnded,
    BreakApproved,
    BreakRejected,
    SessionReconciled,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::CheckIn => "check_in",
            ActivityKind::CheckOut => "check_out",
            ActivityKind::BreakRequested => "break_requested",
            ActivityKind::BreakStarted => "break_started",
            ActivityKind::BreakEnded => "break_ended",
            ActivityKind::BreakApproved => "break_approved",
            ActivityKind::BreakRejected => "break_rejected",
            ActivityKind::SessionReconciled => "session_reconciled",
        }
    }
}

/// Append-only audit record of a state-machine transition. The core never
/// mutates or deletes entries; retention is an operational concern.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub session_id: Option<Uuid>,
    pub action: ActivityKind,
    pub details: Json<serde_json::Value>,
    pub recorded_at: DateTime<Utc>,
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{AgentSession, BreakRequest, Shift};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Punctuality {
    OnTime,
    Late,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckInOutcome {
    pub session: AgentSession,
    pub shift: Shift,
    pub punctuality: Punctuality,
    pub late_minutes: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkSummary {
    pub total_minutes: i64,
    pub break_minutes: i64,
    pub work_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckOutOutcome {
    pub session: AgentSession,
    pub summary: WorkSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakRequestOutcome {
    pub request: BreakRequest,
    /// True when the policy requires an approver; the session stays active
    /// until the decision lands.
    pub requires_approval: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndBreakOutcome {
    pub request: BreakRequest,
    pub actual_minutes: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApproveBreakOutcome {
    pub request: BreakRequest,
    pub session: AgentSession,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectBreakOutcome {
    pub request: BreakRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub session_ids: Vec<Uuid>,
}

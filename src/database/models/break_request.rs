use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum BreakType {
    Short,
    Lunch,
    Emergency,
}

impl BreakType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakType::Short => "short",
            BreakType::Lunch => "lunch",
            BreakType::Emergency => "emergency",
        }
    }
}

impl std::fmt::Display for BreakType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a break request. `Pending` exists only under
/// approval-required policies; approval moves straight to `Active` (the
/// break starts at the decision). Terminal states are `Rejected` and
/// `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum BreakRequestStatus {
    Pending,
    Active,
    Rejected,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BreakRequest {
    pub id: Uuid,
    pub session_id: Uuid,
    pub agent_id: Uuid,
    pub break_type: BreakType,
    pub requested_minutes: i32,
    /// Set when the break ends; wall-clock minutes actually spent.
    pub actual_minutes: Option<i32>,
    pub status: BreakRequestStatus,
    pub reason: Option<String>,
    pub decision_notes: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<Uuid>,
}

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::attendance::{ApproveBreakOutcome, ReconcileOutcome, RejectBreakOutcome};
use crate::database::models::ActivityLogEntry;
use crate::middleware::{ApiResponse, ApiResult, AuthAgent};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ApproveBody {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectBody {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub agent_id: Uuid,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileBody {
    /// Close sessions from days strictly before this date; defaults to today.
    pub before: Option<NaiveDate>,
}

/// POST /api/admin/breaks/:id/approve
pub async fn approve_break(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthAgent>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<ApproveBody>>,
) -> ApiResult<ApproveBreakOutcome> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let outcome = state
        .attendance
        .approve_break(request_id, admin.agent_id, body.notes)
        .await?;

    Ok(ApiResponse::success(outcome))
}

/// POST /api/admin/breaks/:id/reject
pub async fn reject_break(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthAgent>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<RejectBody>>,
) -> ApiResult<RejectBreakOutcome> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let reason = body.reason.unwrap_or_default();

    let outcome = state
        .attendance
        .reject_break(request_id, admin.agent_id, &reason)
        .await?;

    Ok(ApiResponse::success(outcome))
}

/// GET /api/admin/activity?agent_id=...&limit=...
pub async fn activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Vec<ActivityLogEntry>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let entries = state.store.recent_activity(query.agent_id, limit).await?;
    Ok(ApiResponse::success(entries))
}

/// POST /api/admin/reconcile - close out abandoned sessions
pub async fn reconcile(
    State(state): State<AppState>,
    body: Option<Json<ReconcileBody>>,
) -> ApiResult<ReconcileOutcome> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let before = body.before.unwrap_or_else(|| state.attendance.work_date());

    let outcome = state.attendance.reconcile_abandoned(before).await?;
    Ok(ApiResponse::success(outcome))
}

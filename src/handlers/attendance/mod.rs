use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::attendance::{
    BreakRequestOutcome, CheckInOutcome, CheckOutOutcome, EndBreakOutcome,
};
use crate::database::models::{AgentSession, BreakType};
use crate::middleware::rate_limit::client_ip;
use crate::middleware::{ApiResponse, ApiResult, AuthAgent};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PunchBody {
    pub ip: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequestBreakBody {
    pub break_type: BreakType,
    pub requested_minutes: i32,
    pub reason: Option<String>,
}

/// POST /api/attendance/check-in
pub async fn check_in(
    State(state): State<AppState>,
    Extension(agent): Extension<AuthAgent>,
    headers: HeaderMap,
    body: Option<Json<PunchBody>>,
) -> ApiResult<CheckInOutcome> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let ip = body.ip.or_else(|| Some(client_ip(&headers)));

    let outcome = state
        .attendance
        .check_in(agent.agent_id, ip, body.location)
        .await?;

    Ok(ApiResponse::created(outcome))
}

/// POST /api/attendance/check-out
pub async fn check_out(
    State(state): State<AppState>,
    Extension(agent): Extension<AuthAgent>,
    headers: HeaderMap,
    body: Option<Json<PunchBody>>,
) -> ApiResult<CheckOutOutcome> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let ip = body.ip.or_else(|| Some(client_ip(&headers)));

    let outcome = state
        .attendance
        .check_out(agent.agent_id, ip, body.location)
        .await?;

    Ok(ApiResponse::success(outcome))
}

/// POST /api/attendance/breaks - request (or immediately start) a break
pub async fn request_break(
    State(state): State<AppState>,
    Extension(agent): Extension<AuthAgent>,
    Json(body): Json<RequestBreakBody>,
) -> ApiResult<BreakRequestOutcome> {
    let outcome = state
        .attendance
        .request_break(
            agent.agent_id,
            body.break_type,
            body.requested_minutes,
            body.reason,
        )
        .await?;

    Ok(ApiResponse::created(outcome))
}

/// POST /api/attendance/breaks/end
pub async fn end_break(
    State(state): State<AppState>,
    Extension(agent): Extension<AuthAgent>,
) -> ApiResult<EndBreakOutcome> {
    let outcome = state.attendance.end_break(agent.agent_id).await?;
    Ok(ApiResponse::success(outcome))
}

/// GET /api/attendance/today - today's session, if any
pub async fn today(
    State(state): State<AppState>,
    Extension(agent): Extension<AuthAgent>,
) -> ApiResult<Option<AgentSession>> {
    let session = state.attendance.today(agent.agent_id).await?;
    Ok(ApiResponse::success(session))
}

/// GET /api/attendance/sessions/:id - ownership-checked session snapshot
pub async fn session(
    State(state): State<AppState>,
    Extension(agent): Extension<AuthAgent>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<AgentSession> {
    let session = state
        .attendance
        .session_snapshot(agent.agent_id, agent.is_admin(), session_id)
        .await?;
    Ok(ApiResponse::success(session))
}

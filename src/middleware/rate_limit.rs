use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::config;
use crate::error::ApiError;
use crate::state::AppState;

use super::auth::AuthAgent;

/// Fixed-window request limiter over the injected cache client. Keyed by
/// the authenticated agent when available so an agent behind a shared NAT
/// is not throttled by coworkers; falls back to the forwarded client IP.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let api = &config::config().api;

    let key = match request.extensions().get::<AuthAgent>() {
        Some(agent) => format!("rl:agent:{}", agent.agent_id),
        None => format!("rl:ip:{}", client_ip(&headers)),
    };

    let count = state
        .cache
        .incr_window(&key, api.rate_limit_window_secs)
        .await;

    if count > api.rate_limit_requests as u64 {
        return Err(ApiError::too_many_requests("Rate limit exceeded"));
    }

    Ok(next.run(request).await)
}

/// Best-effort client address from proxy headers.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

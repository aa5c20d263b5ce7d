use axum::response::{IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::manager::DatabaseManager;

/// GET / - service banner
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Shiftdesk API",
            "version": version,
            "description": "Back-office attendance API (Axum)",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "attendance": "/api/attendance/* (protected)",
                "admin": "/api/admin/* (protected, admin role)",
            }
        }
    }))
}

/// GET /health - liveness plus database connectivity
pub async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}

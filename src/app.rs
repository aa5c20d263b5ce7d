use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::attendance::AttendanceService;
use crate::cache::MemoryCache;
use crate::clock::{Clock, SystemClock};
use crate::config;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::handlers;
use crate::middleware::{admin_middleware, jwt_auth_middleware, rate_limit_middleware};
use crate::state::AppState;
use crate::store::PgAttendanceStore;

/// Wire the production dependency graph: Postgres-backed stores, the system
/// clock, and an in-process counter cache, all injected into the service.
pub async fn build_state() -> Result<AppState, DatabaseError> {
    let pool = DatabaseManager::pool().await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(PgAttendanceStore::new(pool));
    let cache = Arc::new(MemoryCache::new(clock.clone()));

    let attendance = Arc::new(AttendanceService::new(
        store.clone(),
        store.clone(),
        clock,
        config::config().attendance.clone(),
    ));

    Ok(AppState {
        attendance,
        store: store.clone(),
        directory: store,
        cache,
    })
}

pub fn router(state: AppState) -> Router {
    let config = config::config();

    let admin_routes = Router::new()
        .route("/api/admin/breaks/:id/approve", post(handlers::admin::approve_break))
        .route("/api/admin/breaks/:id/reject", post(handlers::admin::reject_break))
        .route("/api/admin/activity", get(handlers::admin::activity))
        .route("/api/admin/reconcile", post(handlers::admin::reconcile))
        .layer(from_fn(admin_middleware));

    let mut protected = Router::new()
        .route("/api/attendance/check-in", post(handlers::attendance::check_in))
        .route("/api/attendance/check-out", post(handlers::attendance::check_out))
        .route("/api/attendance/breaks", post(handlers::attendance::request_break))
        .route("/api/attendance/breaks/end", post(handlers::attendance::end_break))
        .route("/api/attendance/today", get(handlers::attendance::today))
        .route("/api/attendance/sessions/:id", get(handlers::attendance::session))
        .merge(admin_routes);

    // Layer order: auth must run before the limiter so agent-keyed limits
    // see the authenticated identity.
    if config.api.enable_rate_limiting {
        protected = protected.layer(from_fn_with_state(state.clone(), rate_limit_middleware));
    }
    let protected = protected.layer(from_fn(jwt_auth_middleware));

    let mut app = Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .merge(protected);

    if config.security.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

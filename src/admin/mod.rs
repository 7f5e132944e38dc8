//! Operator endpoints, behind bearer-token auth.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use crate::http::server::AppState;
use self::auth::admin_auth_middleware;
use self::handlers::*;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/circuit-breakers", get(get_circuit_breakers))
        .route("/admin/health-cache", get(get_health_cache))
        .route("/admin/dedup", get(get_dedup_stats))
        .route("/admin/dedup/{correlation_id}", get(get_dedup_entry))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}

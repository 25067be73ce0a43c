//! Router

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    current_state, end_session, exit, health_check, list_plans, navigate, select_plan,
    SESSION_HEADER,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([SESSION_HEADER]);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/plans", get(list_plans))

        // Upgrade flow
        .route("/api/upgrade", get(navigate).delete(end_session))
        .route("/api/upgrade/state", get(current_state))
        .route("/api/upgrade/select", post(select_plan))
        .route("/api/upgrade/exit", post(exit))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

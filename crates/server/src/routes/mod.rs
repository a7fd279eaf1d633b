pub mod feedback;
pub mod medlab;
pub mod monitor;
pub mod rbac;
pub mod user;

use axum::{Router, middleware::from_fn_with_state};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{middleware, state::AppState};

/// Full application router. Management endpoints sit behind the bearer
/// token guard; public endpoints (health, log ingestion, feedback
/// submission, login, medlab advice) do not.
pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .merge(rbac::router())
        .merge(monitor::admin_router())
        .merge(feedback::admin_router())
        .merge(user::admin_router())
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let public = Router::new()
        .merge(monitor::public_router())
        .merge(feedback::public_router())
        .merge(user::public_router())
        .merge(medlab::router());

    Router::new()
        .merge(admin)
        .merge(public)
        .layer(from_fn_with_state(state.clone(), middleware::access_log))
        .layer(axum::middleware::from_fn(middleware::request_id))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

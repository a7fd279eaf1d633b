//! Routes for visitor feedback.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{delete, get, post, put},
};
use db::models::feedback::{CreateFeedback, Feedback, FeedbackStatus};
use serde::Deserialize;
use services::services::feedback::{FeedbackQuery, FeedbackService};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

pub async fn submit(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateFeedback>,
) -> Result<ResponseJson<ApiResponse<Feedback>>, ApiError> {
    let feedback = FeedbackService::submit(&state.db().pool, payload).await?;
    Ok(ResponseJson(ApiResponse::success(feedback)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<FeedbackQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Feedback>>>, ApiError> {
    let feedback = FeedbackService::list(&state.db().pool, query).await?;
    Ok(ResponseJson(ApiResponse::success(feedback)))
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: FeedbackStatus,
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateStatusRequest>,
) -> Result<ResponseJson<ApiResponse<Feedback>>, ApiError> {
    let feedback = FeedbackService::update_status(&state.db().pool, id, payload.status).await?;
    Ok(ResponseJson(ApiResponse::success(feedback)))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    FeedbackService::delete(&state.db().pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Submission is open to visitors.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/feedback/submit", post(submit))
}

/// Management endpoints; guarded in routes::router.
pub fn admin_router() -> Router<AppState> {
    Router::new().nest(
        "/feedback",
        Router::new()
            .route("/list", get(list))
            .route("/{id}/status", put(update_status))
            .route("/{id}", delete(remove)),
    )
}

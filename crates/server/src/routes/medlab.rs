//! Route for the lab-result advice feature.

use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use services::services::medlab::{MedLabAdviceRequest, MedLabAdviceResponse, MedLabService};
use utils::response::ApiResponse;

use crate::{error::ApiError, state::AppState};

pub async fn advice(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<MedLabAdviceRequest>,
) -> Result<ResponseJson<ApiResponse<MedLabAdviceResponse>>, ApiError> {
    let chat = state
        .chat()
        .ok_or_else(|| ApiError::UpstreamAi("chat api is not configured".to_string()))?;

    let response = MedLabService::advice(chat, payload).await?;
    Ok(ResponseJson(ApiResponse::success(response)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/ai/medlab/advice", post(advice))
}

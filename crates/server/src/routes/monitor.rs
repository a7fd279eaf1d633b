//! Routes for health, metrics, and the log pipeline.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use db::models::system_log::SystemLog;
use serde::Deserialize;
use services::services::monitor::{
    HealthSnapshot, LogCategory, LogIngestRequest, LogQuery, MetricsSnapshot, MonitorService,
};
use utils::response::ApiResponse;

use crate::{error::ApiError, state::AppState};

pub async fn health(
    State(state): State<AppState>,
) -> ResponseJson<ApiResponse<HealthSnapshot>> {
    ResponseJson(ApiResponse::success(MonitorService::health(
        state.started_at(),
    )))
}

pub async fn metrics(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<MetricsSnapshot>>, ApiError> {
    let snapshot = MonitorService::metrics(&state.db().pool, state.started_at()).await?;
    Ok(ResponseJson(ApiResponse::success(snapshot)))
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Open ingestion endpoint for the React apps.
pub async fn ingest_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::Json(payload): axum::Json<LogIngestRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let ip = header(&headers, "x-forwarded-for")
        .map(|v| v.split(',').next().unwrap_or("").trim().to_string())
        .filter(|v| !v.is_empty());
    let user_agent = header(&headers, "user-agent");

    MonitorService::ingest(&state.db().pool, state.logs(), payload, ip, user_agent).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn query_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<SystemLog>>>, ApiError> {
    let logs = MonitorService::query_logs(&state.db().pool, query).await?;
    Ok(ResponseJson(ApiResponse::success(logs)))
}

#[derive(Debug, Deserialize)]
pub struct TailQuery {
    pub date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Tail of a category's log file; `date` only matters for the per-day
/// categories.
pub async fn tail_file_log(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<TailQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<String>>>, ApiError> {
    let category: LogCategory = category
        .parse()
        .map_err(|_| ApiError::Validation(format!("unknown log category: {category}")))?;

    let lines = state
        .logs()
        .tail(
            category,
            query.date.unwrap_or_else(|| Utc::now().date_naive()),
            query.limit.unwrap_or(200).min(2000),
        )
        .await?;

    Ok(ResponseJson(ApiResponse::success(lines)))
}

/// Endpoints open to unauthenticated clients.
pub fn public_router() -> Router<AppState> {
    Router::new().nest(
        "/api/public/monitor",
        Router::new()
            .route("/health", get(health))
            .route("/log", post(ingest_log)),
    )
}

/// Admin-only endpoints; the auth guard is layered on in routes::router.
pub fn admin_router() -> Router<AppState> {
    Router::new().nest(
        "/api/monitor",
        Router::new()
            .route("/metrics", get(metrics))
            .route("/logs", get(query_logs))
            .route("/files/{category}", get(tail_file_log)),
    )
}

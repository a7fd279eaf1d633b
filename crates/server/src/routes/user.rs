//! Authentication routes.

use axum::{
    Extension, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::user::User;
use services::services::auth::{AuthService, Claims, LoginRequest, LoginResponse, UserProfile};
use utils::response::ApiResponse;

use crate::{error::ApiError, state::AppState};

pub async fn login(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<LoginResponse>>, ApiError> {
    if payload.username.trim().is_empty() {
        return Err(ApiError::MissingParameter("username".to_string()));
    }
    if payload.password.is_empty() {
        return Err(ApiError::MissingParameter("password".to_string()));
    }

    let config = state.config();
    let response = AuthService::login(
        &state.db().pool,
        &config.jwt_secret,
        config.jwt_ttl_hours,
        payload,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(response)))
}

/// Profile of the authenticated caller. Claims come from the auth guard.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ResponseJson<ApiResponse<UserProfile>>, ApiError> {
    let user = User::find_by_id(&state.db().pool, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Authentication("unknown user".to_string()))?;
    let profile = AuthService::profile(&state.db().pool, &user).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/user/login", post(login))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/user/me", get(me))
}

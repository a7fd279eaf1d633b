//! Routes for permission and role management.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::{
    permission::{CreatePermission, Permission, UpdatePermission},
    role::{CreateRole, Role, UpdateRole},
};
use serde::Deserialize;
use services::services::rbac::{PermissionNode, RbacService, RoleWithPermissions};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

pub async fn list_permissions(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Permission>>>, ApiError> {
    let permissions = RbacService::list_permissions(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(permissions)))
}

pub async fn permission_tree(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<PermissionNode>>>, ApiError> {
    let tree = RbacService::permission_tree(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(tree)))
}

pub async fn create_permission(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreatePermission>,
) -> Result<ResponseJson<ApiResponse<Permission>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::MissingParameter("name".to_string()));
    }
    if payload.code.trim().is_empty() {
        return Err(ApiError::MissingParameter("code".to_string()));
    }
    let permission = RbacService::create_permission(&state.db().pool, payload).await?;
    Ok(ResponseJson(ApiResponse::success(permission)))
}

pub async fn update_permission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdatePermission>,
) -> Result<ResponseJson<ApiResponse<Permission>>, ApiError> {
    let permission = RbacService::update_permission(&state.db().pool, id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(permission)))
}

pub async fn delete_permission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    RbacService::delete_permission(&state.db().pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn list_roles(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<RoleWithPermissions>>>, ApiError> {
    let roles = RbacService::list_roles(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(roles)))
}

pub async fn create_role(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateRole>,
) -> Result<ResponseJson<ApiResponse<Role>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::MissingParameter("name".to_string()));
    }
    let role = RbacService::create_role(&state.db().pool, payload).await?;
    Ok(ResponseJson(ApiResponse::success(role)))
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateRole>,
) -> Result<ResponseJson<ApiResponse<Role>>, ApiError> {
    let role = RbacService::update_role(&state.db().pool, id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(role)))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    RbacService::delete_role(&state.db().pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Wholesale replacement of a role's permission set
#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AssignPermissionsRequest {
    pub permission_ids: Vec<Uuid>,
}

pub async fn assign_permissions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<AssignPermissionsRequest>,
) -> Result<ResponseJson<ApiResponse<Vec<Permission>>>, ApiError> {
    let assigned =
        RbacService::assign_permissions(&state.db().pool, id, payload.permission_ids).await?;
    Ok(ResponseJson(ApiResponse::success(assigned)))
}

pub async fn role_permissions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Permission>>>, ApiError> {
    let permissions = RbacService::role_permissions(&state.db().pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(permissions)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .nest(
            "/permission",
            Router::new()
                .route("/list", get(list_permissions))
                .route("/tree", get(permission_tree))
                .route("/create", post(create_permission))
                .route("/{id}", put(update_permission).delete(delete_permission)),
        )
        .nest(
            "/role",
            Router::new()
                .route("/list", get(list_roles))
                .route("/create", post(create_role))
                .route("/{id}", put(update_role).delete(delete_role))
                .route("/{id}/permissions", get(role_permissions).post(assign_permissions)),
        )
}

//! Central error type: maps service failures onto the wire envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    auth::AuthError, chat_api::ChatApiError, feedback::FeedbackError, medlab::MedLabError,
    monitor::MonitorError, rbac::RbacError,
};
use thiserror::Error;
use tracing::error;
use utils::response::{ApiResponse, ErrorCode};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("missing parameter: {0}")]
    MissingParameter(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Authentication(String),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("token expired")]
    TokenExpired,
    #[error("{0}")]
    Authorization(String),
    #[error("file error: {0}")]
    File(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("upstream ai error: {0}")]
    UpstreamAi(String),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::MissingParameter(_) => ErrorCode::MissingParameter,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Authentication(_) => ErrorCode::Authentication,
            Self::InvalidCredentials => ErrorCode::InvalidCredentials,
            Self::TokenExpired => ErrorCode::TokenExpired,
            Self::Authorization(_) => ErrorCode::Authorization,
            Self::File(_) => ErrorCode::File,
            Self::Database(_) => ErrorCode::Database,
            Self::UpstreamAi(_) => ErrorCode::UpstreamAi,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = StatusCode::from_u16(code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = ApiResponse::<()>::error(code, self.to_string());
        (status, Json(body)).into_response()
    }
}

impl From<RbacError> for ApiError {
    fn from(err: RbacError) -> Self {
        match err {
            RbacError::Database(e) => Self::Database(e),
            RbacError::PermissionNotFound(_) | RbacError::RoleNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            RbacError::DuplicateCode(_)
            | RbacError::HasChildren
            | RbacError::SelfParent
            | RbacError::DescendantParent
            | RbacError::UnknownParent(_) => Self::Validation(err.to_string()),
        }
    }
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::Database(e) => Self::Database(e),
            MonitorError::File(e) => Self::File(e.to_string()),
            MonitorError::Validation(msg) => Self::Validation(msg),
        }
    }
}

impl From<FeedbackError> for ApiError {
    fn from(err: FeedbackError) -> Self {
        match err {
            FeedbackError::Database(e) => Self::Database(e),
            FeedbackError::Validation(msg) => Self::Validation(msg),
            FeedbackError::NotFound(_) => Self::NotFound(err.to_string()),
        }
    }
}

impl From<MedLabError> for ApiError {
    fn from(err: MedLabError) -> Self {
        match err {
            MedLabError::Validation(msg) => Self::Validation(msg),
            MedLabError::ChatApi(e) => e.into(),
        }
    }
}

impl From<ChatApiError> for ApiError {
    fn from(err: ChatApiError) -> Self {
        Self::UpstreamAi(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Database(e) => Self::Database(e),
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::Inactive => Self::Authorization(err.to_string()),
            AuthError::TokenExpired => Self::TokenExpired,
            AuthError::InvalidToken => Self::Authentication(err.to_string()),
        }
    }
}

//! Uniform JSON envelope shared by every endpoint.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Numeric error codes carried in the envelope.
///
/// Codes are grouped by range: 1001-1099 request/validation problems,
/// 1100-1199 auth problems, 1200-1299 server-side failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Validation = 1001,
    MissingParameter = 1002,
    NotFound = 1040,
    Authentication = 1100,
    InvalidCredentials = 1101,
    TokenExpired = 1102,
    Authorization = 1110,
    Internal = 1200,
    Database = 1201,
    File = 1210,
    UpstreamAi = 1220,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// HTTP status derived from the code range. NotFound is the one
    /// code that carries its own status.
    pub fn http_status(self) -> u16 {
        if self == Self::NotFound {
            return 404;
        }
        match self.as_u16() {
            1001..=1099 => 400,
            1100..=1199 => 400,
            1200..=1299 => 500,
            _ => 500,
        }
    }
}

/// Response envelope: `{success, code, message, data, timestamp, requestId?}`.
///
/// `code` is 0 on success, an [`ErrorCode`] value otherwise. `timestamp`
/// is epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: 0,
            message: "ok".to_string(),
            data: Some(data),
            timestamp: Utc::now().timestamp_millis(),
            request_id: None,
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.as_u16(),
            message: message.into(),
            data: None,
            timestamp: Utc::now().timestamp_millis(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_range_maps_to_400() {
        assert_eq!(ErrorCode::Validation.http_status(), 400);
        assert_eq!(ErrorCode::MissingParameter.http_status(), 400);
    }

    #[test]
    fn auth_range_maps_to_400() {
        assert_eq!(ErrorCode::Authentication.http_status(), 400);
        assert_eq!(ErrorCode::InvalidCredentials.http_status(), 400);
        assert_eq!(ErrorCode::TokenExpired.http_status(), 400);
        assert_eq!(ErrorCode::Authorization.http_status(), 400);
    }

    #[test]
    fn server_range_maps_to_500() {
        assert_eq!(ErrorCode::Internal.http_status(), 500);
        assert_eq!(ErrorCode::Database.http_status(), 500);
        assert_eq!(ErrorCode::UpstreamAi.http_status(), 500);
    }

    #[test]
    fn not_found_is_404() {
        assert_eq!(ErrorCode::NotFound.http_status(), 404);
    }

    #[test]
    fn success_envelope_shape() {
        let res = ApiResponse::success(serde_json::json!({"id": 1}));
        let value = serde_json::to_value(&res).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["code"], 0);
        assert_eq!(value["message"], "ok");
        assert!(value["timestamp"].is_i64());
        assert!(value.get("requestId").is_none());
    }

    #[test]
    fn error_envelope_carries_code_and_request_id() {
        let res = ApiResponse::<()>::error(ErrorCode::NotFound, "role not found")
            .with_request_id("req-1");
        let value = serde_json::to_value(&res).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["code"], 1040);
        assert_eq!(value["requestId"], "req-1");
        assert!(value.get("data").is_none());
    }
}

//! Request-id, access-log, and auth-guard middleware.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use serde::Serialize;
use services::services::{auth::AuthService, monitor::LogCategory};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id attached to the request extensions by [`request_id`].
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Assign each request an id, echo it in the response headers, and
/// stamp it into the JSON response envelope.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = stamp_envelope(next.run(request).await, &id).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Insert `requestId` into envelope bodies. Non-JSON responses and
/// JSON that is not an envelope object pass through untouched.
async fn stamp_envelope(response: Response, id: &str) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };

    let stamped = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(serde_json::Value::Object(mut envelope)) if envelope.contains_key("success") => {
            envelope.insert(
                "requestId".to_string(),
                serde_json::Value::String(id.to_string()),
            );
            serde_json::to_vec(&envelope).unwrap_or_else(|_| bytes.to_vec())
        }
        _ => bytes.to_vec(),
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(stamped))
}

#[derive(Serialize)]
struct AccessLogLine<'a> {
    time: String,
    method: &'a str,
    path: String,
    status: u16,
    latency_ms: u128,
    request_id: Option<&'a str>,
}

/// Append one line per request to `logs/access.log`.
pub async fn access_log(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone());

    let start = std::time::Instant::now();
    let response = next.run(request).await;

    let line = AccessLogLine {
        time: Utc::now().to_rfc3339(),
        method: method.as_str(),
        path,
        status: response.status().as_u16(),
        latency_ms: start.elapsed().as_millis(),
        request_id: request_id.as_deref(),
    };
    state
        .logs()
        .append_best_effort(LogCategory::Access, &line)
        .await;

    response
}

/// Reject requests without a valid bearer token, and stash the decoded
/// claims for handlers that want the caller's identity.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Authentication("missing bearer token".to_string()))?;

    let claims = AuthService::verify_token(&state.config().jwt_secret, token)?;
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

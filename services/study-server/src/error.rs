//! JSON error responses
//!
//! Every failing `/api` call answers with
//! `{"error":{"type":"...","message":"...","request_id":"req_..."}}` and an
//! `x-request-id` header carrying the same ID.

use axum::http::header::{self, HeaderName};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use spotify_api::ApiError;

/// Fresh request ID for correlating a response with its log lines.
pub fn request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

/// Build the JSON error envelope.
pub fn error_response(
    status: StatusCode,
    error_type: &str,
    message: &str,
    request_id: &str,
) -> Response {
    let error = serde_json::json!({
        "type": error_type,
        "message": message,
        "request_id": request_id,
    });
    respond(status, error, request_id)
}

/// HTTP status for a gateway failure. Anything Spotify did wrong is a 502.
pub fn api_error_status(err: &ApiError) -> StatusCode {
    match err {
        ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ApiError::Upstream { .. } | ApiError::Transport(_) | ApiError::Decode(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

/// Error envelope for a gateway failure. Upstream failures also carry
/// `upstream_status`.
pub fn api_error_response(err: &ApiError, request_id: &str) -> Response {
    let mut error = serde_json::json!({
        "type": err.kind(),
        "message": err.to_string(),
        "request_id": request_id,
    });
    if let ApiError::Upstream { status, .. } = err {
        error["upstream_status"] = serde_json::json!(status);
    }
    respond(api_error_status(err), error, request_id)
}

fn respond(status: StatusCode, error: serde_json::Value, request_id: &str) -> Response {
    let body = serde_json::json!({ "error": error });
    (
        status,
        [
            (header::CONTENT_TYPE, "application/json"),
            (HeaderName::from_static("x-request-id"), request_id),
        ],
        body.to_string(),
    )
        .into_response()
}

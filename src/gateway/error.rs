//! HTTP 错误响应：CoordinatorError → 状态码 + `{code, message}`

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::core::CoordinatorError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }
}

pub fn status_for(err: &CoordinatorError) -> StatusCode {
    match err {
        CoordinatorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        CoordinatorError::CapabilityMissing { .. } => StatusCode::FORBIDDEN,
        CoordinatorError::NotFound(_) => StatusCode::NOT_FOUND,
        CoordinatorError::AlreadyInitialized
        | CoordinatorError::InvalidState(_)
        | CoordinatorError::NotReady(_) => StatusCode::CONFLICT,
        CoordinatorError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
        CoordinatorError::Busy(_) => StatusCode::TOO_MANY_REQUESTS,
        CoordinatorError::BackendFailure(_) => StatusCode::BAD_GATEWAY,
        CoordinatorError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        Self::new(status_for(&err), err.code(), err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(code = self.code, "Request failed: {}", self.message);
        }
        let body = serde_json::json!({
            "code": self.code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use shared::error::ErrorCode;

/// Uniform API error: `{error:{code,message,retryAfterSec?}}`. 429s also set
/// a `Retry-After` header so clients don't have to parse the body to back off.
#[derive(Debug)]
pub struct ApiError {
    pub code: ErrorCode,
    pub status: StatusCode,
    pub message: String,
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(code: ErrorCode, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
            retry_after_secs: None,
        }
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            code: ErrorCode::AuthRateLimited,
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "too many attempts, try again later".to_string(),
            retry_after_secs: Some(retry_after_secs),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, StatusCode::NOT_FOUND, message)
    }

    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = ?err, "internal error");
        Self::new(ErrorCode::Internal, StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::internal(err)
    }
}

impl From<txengine::EngineError> for ApiError {
    fn from(err: txengine::EngineError) -> Self {
        match err {
            txengine::EngineError::Busy(msg) => {
                Self::new(ErrorCode::TxBusy, StatusCode::CONFLICT, msg)
            }
            txengine::EngineError::NotFound(id) => {
                Self::not_found(ErrorCode::TxNotFound, format!("transaction {id} not found"))
            }
            txengine::EngineError::AlreadyFinished(id) => Self::new(
                ErrorCode::TxStepFailed,
                StatusCode::CONFLICT,
                format!("transaction {id} already finished"),
            ),
            txengine::EngineError::Internal(err) => Self::internal(err),
        }
    }
}

impl From<crate::workflows::WorkflowError> for ApiError {
    fn from(err: crate::workflows::WorkflowError) -> Self {
        match err {
            crate::workflows::WorkflowError::Validation(e) => {
                Self::new(e.code, StatusCode::BAD_REQUEST, e.message)
            }
            crate::workflows::WorkflowError::Conflict { code, message } => {
                Self::new(code, StatusCode::CONFLICT, message)
            }
            crate::workflows::WorkflowError::Internal(e) => Self::internal(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(rename = "retryAfterSec", skip_serializing_if = "Option::is_none")]
    retry_after_sec: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.as_wire_str(),
                message: self.message,
                retry_after_sec: self.retry_after_secs,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs
            && let Ok(value) = secs.to_string().parse::<axum::http::HeaderValue>()
        {
            response.headers_mut().insert("Retry-After", value);
        }
        response
    }
}

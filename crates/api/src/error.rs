use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::{error, warn};

use annsuraksha_ledger::workflow::WorkflowError;

const ERROR_CODE_INVALID_REQUEST: &str = "invalid_request";
const ERROR_CODE_UNAUTHORIZED: &str = "unauthorized";
const ERROR_CODE_FORBIDDEN: &str = "forbidden";
const ERROR_CODE_NOT_FOUND: &str = "not_found";
const ERROR_CODE_CONFLICT: &str = "conflict";
const ERROR_CODE_CHAIN_ERROR: &str = "chain_error";
const ERROR_CODE_UNAVAILABLE: &str = "unavailable";
const ERROR_CODE_INTERNAL_ERROR: &str = "internal_error";

/// `{"error": {"code", "message"}}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorInfo,
}

/// Machine-readable code plus a human message.
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    /// Stable error code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Handler result.
pub type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: ErrorInfo {
                code,
                message: message.into(),
            },
        }),
    )
}

/// 400
pub fn bad_request(msg: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, ERROR_CODE_INVALID_REQUEST, msg)
}

/// 401
pub fn unauthorized(msg: impl Into<String>) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, ERROR_CODE_UNAUTHORIZED, msg)
}

/// 403
pub fn forbidden(msg: impl Into<String>) -> ApiError {
    api_error(StatusCode::FORBIDDEN, ERROR_CODE_FORBIDDEN, msg)
}

/// 404
pub fn not_found(msg: impl Into<String>) -> ApiError {
    api_error(StatusCode::NOT_FOUND, ERROR_CODE_NOT_FOUND, msg)
}

/// 409
pub fn conflict(msg: impl Into<String>) -> ApiError {
    api_error(StatusCode::CONFLICT, ERROR_CODE_CONFLICT, msg)
}

/// 503
pub fn service_unavailable(msg: impl Into<String>) -> ApiError {
    api_error(StatusCode::SERVICE_UNAVAILABLE, ERROR_CODE_UNAVAILABLE, msg)
}

/// 500, logging the cause.
pub fn internal_error<E: std::fmt::Display>(err: E) -> ApiError {
    error!("Request failed: {}", err);
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        ERROR_CODE_INTERNAL_ERROR,
        format!("Internal error: {}", err),
    )
}

/// Map a workflow failure onto 404/400/409/502/500.
pub fn workflow_error(err: WorkflowError) -> ApiError {
    match err {
        WorkflowError::NotFound(msg) => not_found(msg),
        WorkflowError::Invalid(msg) => bad_request(msg),
        WorkflowError::Conflict(msg) => conflict(msg),
        WorkflowError::Chain(e) => {
            warn!("Chain call failed: {:#}", e);
            api_error(
                StatusCode::BAD_GATEWAY,
                ERROR_CODE_CHAIN_ERROR,
                format!("Chain call failed: {:#}", e),
            )
        }
        WorkflowError::Storage(e) => internal_error(format!("{:#}", e)),
    }
}

//! Error types for the Till API.
//!
//! ## Status Mapping
//! ```text
//! ┌───────────────────────────────┬────────┬──────────────────────────────┐
//! │ Source                        │ Status │ Body                         │
//! ├───────────────────────────────┼────────┼──────────────────────────────┤
//! │ CoreError (Validation kind)   │ 400    │ {code, msg}                  │
//! │ CoreError (NotFound kind)     │ 404    │ {code, msg: "<reason>: <id>"}│
//! │ CoreError (Conflict kind)     │ 400    │ {code, msg}                  │
//! │ CoreError (Forbidden kind)    │ 403    │ {code, msg}                  │
//! │ malformed JSON / query        │ 400    │ {code, msg}                  │
//! │ missing X-User-ID             │ 401    │ {code, msg}                  │
//! │ DbError / anything else       │ 500    │ {code, error} (masked)       │
//! └───────────────────────────────┴────────┴──────────────────────────────┘
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use till_core::{CoreError, ErrorKind, ValidationError};
use till_db::{DbError, ServiceError};

/// Till API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(err) => ApiError::Domain(err),
            ServiceError::Db(err) => err.into(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Domain(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

/// Stable machine-readable code for a domain error.
fn domain_code(err: &CoreError) -> &'static str {
    match err {
        CoreError::MissingItems => "MISSING_ITEMS",
        CoreError::MissingPayments => "MISSING_PAYMENTS",
        CoreError::InvalidPaymentMethod(_) => "INVALID_PAYMENT_METHOD",
        CoreError::InvalidPaymentAmount { .. } => "INVALID_PAYMENT_AMOUNT",
        CoreError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
        CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
        CoreError::VariantNotFound { .. } => "VARIANT_NOT_FOUND",
        CoreError::InsufficientVariantStock { .. } => "INSUFFICIENT_VARIANT_STOCK",
        CoreError::InsufficientPayment { .. } => "INSUFFICIENT_PAYMENT",
        CoreError::SaleNotFound(_) => "SALE_NOT_FOUND",
        CoreError::OpenSessionExists { .. } => "OPEN_SESSION_EXISTS",
        CoreError::InvalidInitialCash => "INVALID_INITIAL_CASH",
        CoreError::InvalidActualCash => "INVALID_ACTUAL_CASH",
        CoreError::SessionNotFound(_) => "SESSION_NOT_FOUND",
        CoreError::NotOwner { .. } => "NOT_OWNER",
        CoreError::AlreadyClosed(_) => "ALREADY_CLOSED",
        CoreError::SessionClosed { .. } => "SESSION_CLOSED",
        CoreError::Validation(_) => "VALIDATION_ERROR",
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum ErrorBody {
    Message { code: &'static str, msg: String },
    Internal { code: &'static str, error: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Domain(err) => {
                let status = match err.kind() {
                    ErrorKind::Validation | ErrorKind::Conflict => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                };
                let body = ErrorBody::Message {
                    code: domain_code(&err),
                    msg: err.to_string(),
                };
                (status, body)
            }
            ApiError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::Message {
                    code: "INVALID_REQUEST",
                    msg,
                },
            ),
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::Message {
                    code: "UNAUTHORIZED",
                    msg,
                },
            ),
            ApiError::Internal(detail) => {
                error!(error = %detail, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::Internal {
                        code: "INTERNAL_ERROR",
                        error: "Internal server error".to_string(),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

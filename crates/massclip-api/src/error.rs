//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use massclip_firestore::FirestoreError;
use massclip_storage::StorageError;
use massclip_stripe::StripeError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rejected input with a machine-readable code.
    #[error("{message}")]
    Validation { code: &'static str, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] FirestoreError),

    #[error("Payment gateway error: {0}")]
    Stripe(#[from] StripeError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn validation(code: &'static str, msg: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Firestore(FirestoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Internal(_)
            | ApiError::Storage(_)
            | ApiError::Firestore(_)
            | ApiError::Stripe(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code, when the error carries one.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            ApiError::Validation { code, .. } => Some(*code),
            ApiError::Stripe(_) => Some("PAYMENT_GATEWAY_ERROR"),
            _ => None,
        }
    }

    fn is_upstream(&self) -> bool {
        matches!(
            self,
            ApiError::Internal(_) | ApiError::Storage(_) | ApiError::Firestore(_) | ApiError::Stripe(_)
        ) && self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }

    fn summary(&self) -> &'static str {
        match self {
            ApiError::Storage(_) => "Object storage request failed",
            ApiError::Firestore(_) => "Database request failed",
            ApiError::Stripe(_) => "Payment gateway request failed",
            _ => "Internal server error",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn is_production() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|e| e.eq_ignore_ascii_case("production"))
        .unwrap_or(false)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = if self.is_upstream() {
            error!(error = %self, "Request failed on an upstream dependency");
            if is_production() {
                ErrorResponse {
                    error: "An internal error occurred".to_string(),
                    code: None,
                    details: None,
                }
            } else {
                ErrorResponse {
                    error: self.summary().to_string(),
                    code: self.code(),
                    details: Some(self.to_string()),
                }
            }
        } else {
            ErrorResponse {
                error: self.to_string(),
                code: self.code(),
                details: None,
            }
        };

        (status, Json(body)).into_response()
    }
}

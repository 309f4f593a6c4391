//! # Error Responses
//!
//! JSON error body shared by every endpoint and the conversions from the
//! domain error types.

use axum::{http::StatusCode, Json};
use pet_core::{LocaleError, PaymentError};
use serde::Serialize;
use tracing::{error, warn};

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Handler error: status plus JSON body
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn payment_error_to_response(err: PaymentError) -> ApiError {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match &err {
        PaymentError::SignatureVerification(_) => warn!("Rejected callback: {}", err),
        _ if status.is_server_error() => error!("Payment request failed: {}", err),
        _ => {}
    }

    let mut response = ErrorResponse::new(err.to_string(), err.error_code());
    response.field = err.field().map(String::from);
    (status, Json(response))
}

pub fn locale_error_to_response(err: LocaleError) -> ApiError {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!("Locale pipeline failed: {}", err);
    }
    (status, Json(ErrorResponse::new(err.to_string(), err.error_code())))
}

pub fn validation_error(field: &str, message: impl Into<String>) -> ApiError {
    payment_error_to_response(PaymentError::validation(field, message))
}

pub fn unauthorized() -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("Authentication required", "unauthenticated")),
    )
}

pub fn forbidden() -> ApiError {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorResponse::new("Insufficient permissions", "forbidden")),
    )
}

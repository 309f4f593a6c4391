//! # Error Types
//!
//! Typed error handling for the petcare core.
//! Payment and order operations return `Result<T, PaymentError>`;
//! locale operations return `Result<T, LocaleError>`.

use crate::order::{OrderId, PaymentStatus};
use thiserror::Error;

/// Core error type for payment, order and driver operations
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Malformed or missing request field
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Driver name not present in configuration
    #[error("Unknown payment driver: {name}")]
    UnknownDriver { name: String },

    /// Configuration errors (missing keys, unknown driver class)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No order with this public id (or not visible to the caller)
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    /// Order exists but is not payable in its current state
    #[error("Order {order_id} is {status}, expected pending")]
    InvalidOrderState {
        order_id: OrderId,
        status: PaymentStatus,
    },

    /// Callback tries to move a terminal order into a different terminal state
    #[error("Order {order_id} is already {current}, refusing {incoming}")]
    ConflictingStatus {
        order_id: OrderId,
        current: PaymentStatus,
        incoming: PaymentStatus,
    },

    /// Unique constraint on the public order id was hit
    #[error("Order id already exists: {order_id}")]
    DuplicateOrderId { order_id: OrderId },

    /// Callback signature did not match
    #[error("Signature verification failed: {0}")]
    SignatureVerification(String),

    /// Callback payload lacks required fields or cannot be decoded
    #[error("Malformed callback: {0}")]
    MalformedCallback(String),

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    Provider { provider: String, message: String },

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    Network(String),

    /// Persistence layer failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Shorthand for a field-level validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PaymentError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true if the operation may be retried by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::Network(_)
                | PaymentError::Storage(_)
                | PaymentError::DuplicateOrderId { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Validation { .. } => 400,
            PaymentError::UnknownDriver { .. } => 400,
            PaymentError::Configuration(_) => 500,
            PaymentError::OrderNotFound { .. } => 404,
            PaymentError::InvalidOrderState { .. } => 409,
            PaymentError::ConflictingStatus { .. } => 409,
            PaymentError::DuplicateOrderId { .. } => 409,
            PaymentError::SignatureVerification(_) => 400,
            PaymentError::MalformedCallback(_) => 400,
            PaymentError::Provider { .. } => 502,
            PaymentError::Network(_) => 503,
            PaymentError::Storage(_) => 503,
            PaymentError::Serialization(_) => 500,
            PaymentError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for API clients
    pub fn error_code(&self) -> &'static str {
        match self {
            PaymentError::Validation { .. } => "validation_error",
            PaymentError::UnknownDriver { .. } => "unknown_driver",
            PaymentError::Configuration(_) => "configuration_error",
            PaymentError::OrderNotFound { .. } => "order_not_found",
            PaymentError::InvalidOrderState { .. } => "invalid_order_state",
            PaymentError::ConflictingStatus { .. } => "conflicting_status",
            PaymentError::DuplicateOrderId { .. } => "duplicate_order_id",
            PaymentError::SignatureVerification(_) => "signature_verification_failed",
            PaymentError::MalformedCallback(_) => "malformed_callback",
            PaymentError::Provider { .. } => "provider_error",
            PaymentError::Network(_) => "network_error",
            PaymentError::Storage(_) => "storage_error",
            PaymentError::Serialization(_) => "serialization_error",
            PaymentError::Internal(_) => "internal_error",
        }
    }

    /// Field name for validation errors
    pub fn field(&self) -> Option<&str> {
        match self {
            PaymentError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;

/// Errors raised while resolving or persisting a locale
#[derive(Debug, Error)]
pub enum LocaleError {
    /// The language table could not be read
    #[error("Language catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// The configured fallback locale is not an enabled language
    #[error("Default locale '{code}' is not an enabled language")]
    DefaultNotEnabled { code: String },

    /// Unknown language code in an admin operation
    #[error("Unknown language: {code}")]
    UnknownLanguage { code: String },

    /// Writing a locale to a user profile or session failed
    #[error("Locale persistence failed: {0}")]
    Persistence(String),
}

impl LocaleError {
    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            LocaleError::CatalogUnavailable(_) => 503,
            LocaleError::DefaultNotEnabled { .. } => 500,
            LocaleError::UnknownLanguage { .. } => 404,
            LocaleError::Persistence(_) => 503,
        }
    }

    /// Stable machine-readable code for API clients
    pub fn error_code(&self) -> &'static str {
        match self {
            LocaleError::CatalogUnavailable(_) => "catalog_unavailable",
            LocaleError::DefaultNotEnabled { .. } => "default_locale_disabled",
            LocaleError::UnknownLanguage { .. } => "unknown_language",
            LocaleError::Persistence(_) => "locale_persistence_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(PaymentError::Network("timeout".into()).is_retryable());
        assert!(PaymentError::DuplicateOrderId {
            order_id: OrderId::from_trusted("ORD-1")
        }
        .is_retryable());
        assert!(!PaymentError::validation("amount", "must be positive").is_retryable());
        assert!(!PaymentError::ConflictingStatus {
            order_id: OrderId::from_trusted("ORD-1"),
            current: PaymentStatus::Success,
            incoming: PaymentStatus::Fail,
        }
        .is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(PaymentError::validation("amount", "x").status_code(), 400);
        assert_eq!(
            PaymentError::OrderNotFound {
                order_id: "x".into()
            }
            .status_code(),
            404
        );
        assert_eq!(
            PaymentError::SignatureVerification("bad".into()).status_code(),
            400
        );
        assert_eq!(
            PaymentError::Storage("db down".into()).status_code(),
            503
        );
        assert_eq!(
            LocaleError::CatalogUnavailable("db down".into()).status_code(),
            503
        );
    }

    #[test]
    fn test_error_codes_and_field() {
        let err = PaymentError::validation("order_id", "too long");
        assert_eq!(err.error_code(), "validation_error");
        assert_eq!(err.field(), Some("order_id"));
        assert_eq!(
            PaymentError::UnknownDriver { name: "x".into() }.error_code(),
            "unknown_driver"
        );
        assert!(PaymentError::Internal("x".into()).field().is_none());
    }
}

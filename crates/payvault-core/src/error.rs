//! Unified error taxonomy for payment operations.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

/// Code used when the retry budget is spent on transient failures.
pub const RETRY_EXHAUSTED: &str = "RETRY_EXHAUSTED";

/// Classified error returned by every public payment operation.
///
/// Errors are `Clone` so that a single in-flight submission can hand the same
/// outcome to every caller waiting on its idempotency key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    // ============ Request Errors ============
    /// A request field failed validation. Never retried.
    #[error("Validation error: {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Encryption, decryption or key material failure. Never retried.
    #[error("Security error: {reason}")]
    Security { reason: String },

    /// Resource not found
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    // ============ Transport Errors ============
    /// Connection-level failure talking to the gateway.
    #[error("Network error: {0}")]
    Network(String),

    /// The gateway did not answer in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    // ============ Gateway Errors ============
    /// Terminal gateway failure: a rejected transaction, or the last cause
    /// after the retry budget was exhausted.
    #[error("Gateway error: {code} - {message}")]
    Gateway {
        code: String,
        message: String,
        #[source]
        source: Option<Box<PaymentError>>,
    },

    /// The operation was abandoned before it completed.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    // ============ Infrastructure Errors ============
    /// Local cache or persistence failure.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Security { .. } => "SECURITY_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Gateway { code, .. } => code.as_str(),
            Self::Cancelled(_) => "CANCELLED",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a validation error for a request field.
    #[must_use]
    pub fn validation<T: Into<String>>(field: &'static str, reason: T) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Creates a security error.
    #[must_use]
    pub fn security<T: Into<String>>(reason: T) -> Self {
        Self::Security {
            reason: reason.into(),
        }
    }

    /// Creates a not found error for a resource.
    #[must_use]
    pub fn not_found<T: ToString>(resource_type: &'static str, id: T) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates a gateway rejection without an underlying cause.
    #[must_use]
    pub fn gateway<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::Gateway {
            code: code.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Wraps the last transient failure once the retry budget is spent.
    #[must_use]
    pub fn retry_exhausted(attempts: u32, last: PaymentError) -> Self {
        Self::Gateway {
            code: RETRY_EXHAUSTED.to_string(),
            message: format!("gave up after {attempts} attempts: {last}"),
            source: Some(Box::new(last)),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Only transport-level failures are worth another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// Returns the field name for validation errors.
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Cache(format!("JSON serialization error: {}", err))
    }
}

/// Caller-facing error payload. Carries no transport or stack detail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Offending field for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    /// Creates a new error response from a `PaymentError`.
    #[must_use]
    pub fn from_error(error: &PaymentError) -> Self {
        let message = match error {
            PaymentError::Validation { reason, .. } => reason.clone(),
            PaymentError::Security { .. } => "The payment could not be secured".to_string(),
            PaymentError::Network(_) | PaymentError::Timeout(_) => {
                "The payment service is unreachable, please try again".to_string()
            }
            PaymentError::Gateway { code, .. } if code == RETRY_EXHAUSTED => {
                "The payment service is unreachable, please try again".to_string()
            }
            PaymentError::Gateway { message, .. } => message.clone(),
            PaymentError::NotFound { resource_type, .. } => format!("{resource_type} not found"),
            PaymentError::Cancelled(_) => "The payment was cancelled".to_string(),
            PaymentError::Cache(_) | PaymentError::Configuration(_) | PaymentError::Internal(_) => {
                "An unexpected error occurred".to_string()
            }
        };

        Self {
            code: error.error_code().to_string(),
            message,
            field: error.field().map(str::to_string),
        }
    }
}

impl From<&PaymentError> for ErrorResponse {
    fn from(error: &PaymentError) -> Self {
        Self::from_error(error)
    }
}

//! Result type alias for PayVault.

use crate::PaymentError;

/// A specialized `Result` type for payment operations.
pub type PaymentResult<T> = Result<T, PaymentError>;

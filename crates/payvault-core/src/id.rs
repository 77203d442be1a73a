//! Typed identifiers for payments and submissions.

use crate::{PaymentError, PaymentResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::sync::LazyLock;
use uuid::Uuid;

static PAYMENT_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]+$").expect("payment id pattern compiles"));

/// Checks an externally supplied payment id against `^[A-Za-z0-9-]+$`.
pub fn validate_payment_id(id: &str) -> PaymentResult<()> {
    if PAYMENT_ID_PATTERN.is_match(id) {
        Ok(())
    } else {
        Err(PaymentError::validation(
            "id",
            "payment id may only contain letters, digits and '-'",
        ))
    }
}

/// Opaque payment identifier assigned at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    /// Creates a new time-ordered payment ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Parses a payment ID, rejecting anything outside `[A-Za-z0-9-]`.
    pub fn parse(s: &str) -> PaymentResult<Self> {
        validate_payment_id(s)?;
        Ok(Self(s.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied token tying every attempt of one logical payment together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Creates a new random idempotency key.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for IdempotencyKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IdempotencyKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

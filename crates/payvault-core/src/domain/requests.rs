//! Submission payloads exchanged with the caller and the gateway.

use crate::{IdempotencyKey, PaymentId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// A payment as entered by the cardholder.
///
/// Card number and CVV are zeroed when the request is dropped. The type is
/// deliberately not `Serialize`.
#[derive(Clone)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub currency: String,
    pub card_number: Zeroizing<String>,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub cvv: Zeroizing<String>,
    /// Reuse the same key when re-submitting the same logical payment.
    pub idempotency_key: Option<IdempotencyKey>,
    pub description: Option<String>,
}

impl PaymentRequest {
    /// Creates a request without an idempotency key or description.
    #[must_use]
    pub fn new(
        amount: Decimal,
        currency: impl Into<String>,
        card_number: impl Into<String>,
        expiry_month: u32,
        expiry_year: i32,
        cvv: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            currency: currency.into(),
            card_number: Zeroizing::new(card_number.into()),
            expiry_month,
            expiry_year,
            cvv: Zeroizing::new(cvv.into()),
            idempotency_key: None,
            description: None,
        }
    }

    /// Sets the idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl fmt::Debug for PaymentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentRequest")
            .field("amount", &self.amount)
            .field("currency", &self.currency)
            .field("card_number", &"<redacted>")
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cvv", &"<redacted>")
            .field("idempotency_key", &self.idempotency_key)
            .field("description", &self.description)
            .finish()
    }
}

/// The wire form of a payment: sensitive fields are ciphertext only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedPaymentRequest {
    pub payment_id: PaymentId,
    pub amount: Decimal,
    pub currency: String,
    pub encrypted_card_number: String,
    pub encrypted_cvv: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub idempotency_key: IdempotencyKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Gateway acknowledgement of an accepted payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayReceipt {
    /// Identifier the gateway filed the payment under.
    pub payment_id: PaymentId,
    /// Card number ciphertext echoed back for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_number_echo: Option<String>,
    pub processed_at: DateTime<Utc>,
}

//! Payment entity.

use crate::domain::value_objects::PaymentStatus;
use crate::{PaymentError, PaymentId, PaymentResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A payment as seen by the client: never holds a raw PAN or CVV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Opaque identifier.
    pub id: PaymentId,

    /// Charged amount, always positive.
    pub amount: Decimal,

    /// ISO-4217 currency code.
    pub currency: String,

    /// Ciphertext of the card number.
    pub card_number_token: String,

    /// Display form of the card number, e.g. `**** **** **** 0366`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked_card_number: Option<String>,

    pub expiry_month: u32,
    pub expiry_year: i32,

    /// Lifecycle state.
    pub status: PaymentStatus,

    /// Gateway attempts spent on this payment.
    #[serde(default)]
    pub attempts: u32,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// When this record was last written to the local cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Creates a payment in the `Pending` state.
    #[must_use]
    pub fn pending(
        id: PaymentId,
        amount: Decimal,
        currency: String,
        card_number_token: String,
        expiry_month: u32,
        expiry_year: i32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            amount,
            currency,
            card_number_token,
            masked_card_number: None,
            expiry_month,
            expiry_year,
            status: PaymentStatus::Pending,
            attempts: 0,
            created_at,
            cached_at: None,
        }
    }

    /// Moves the payment through its lifecycle, rejecting illegal steps.
    pub fn transition_to(&mut self, next: PaymentStatus) -> PaymentResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(PaymentError::internal(format!(
                "illegal payment transition {} -> {} for {}",
                self.status, next, self.id
            )));
        }
        self.status = next;
        Ok(())
    }
}

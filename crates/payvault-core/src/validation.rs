//! Card data validation.
//!
//! Checks run in a fixed order and stop at the first violation:
//! card number, expiry, CVV, amount, currency.

use crate::{PaymentRequest, PaymentResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Validation limits supplied by configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationRules {
    /// Largest accepted amount, inclusive. Unbounded when `None`.
    pub max_amount: Option<Decimal>,
    /// Accepted currency codes. Any well-formed code when empty.
    pub allowed_currencies: Vec<String>,
}

/// Fail-fast validator for payment requests.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: ValidationRules,
}

impl Validator {
    /// Creates a validator with the given rules.
    #[must_use]
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    /// Validates a request against the current instant.
    pub fn validate(&self, request: &PaymentRequest, now: DateTime<Utc>) -> PaymentResult<()> {
        rules::card_number(&request.card_number)?;
        rules::expiry(request.expiry_month, request.expiry_year, now)?;
        rules::cvv(&request.cvv)?;
        rules::amount(request.amount, self.rules.max_amount)?;
        rules::currency(&request.currency, &self.rules.allowed_currencies)?;
        Ok(())
    }
}

/// Luhn checksum over an ASCII digit string.
///
/// Starting from the rightmost digit, every second digit is doubled (minus 9
/// when above 9); the number is valid iff the digit sum is a multiple of 10.
#[must_use]
pub fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    luhn_sum(digits, false) % 10 == 0
}

/// Computes the check digit that makes `payload` Luhn-valid when appended.
#[must_use]
pub fn luhn_check_digit(payload: &str) -> Option<u8> {
    if !payload.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // The appended digit becomes position 0, so payload doubling starts at its last digit.
    let sum = luhn_sum(payload, true);
    Some(((10 - sum % 10) % 10) as u8)
}

fn luhn_sum(digits: &str, double_first: bool) -> u32 {
    digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            let double = (i % 2 == 1) != double_first;
            if double {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum()
}

/// Individual checks, in the order `Validator::validate` applies them.
pub mod rules {
    use super::luhn_valid;
    use crate::{PaymentError, PaymentResult};
    use chrono::{DateTime, Datelike, Utc};
    use rust_decimal::Decimal;

    /// Digits only, 13–19 long, Luhn-valid.
    pub fn card_number(number: &str) -> PaymentResult<()> {
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PaymentError::validation("cardNumber", "card number must contain digits only"));
        }
        if !(13..=19).contains(&number.len()) {
            return Err(PaymentError::validation(
                "cardNumber",
                "card number must be 13 to 19 digits long",
            ));
        }
        if !luhn_valid(number) {
            return Err(PaymentError::validation("cardNumber", "card number failed checksum"));
        }
        Ok(())
    }

    /// Month in 1–12 and (year, month) not before the current month.
    pub fn expiry(month: u32, year: i32, now: DateTime<Utc>) -> PaymentResult<()> {
        if !(1..=12).contains(&month) {
            return Err(PaymentError::validation("expiry", "expiry month must be between 1 and 12"));
        }
        if (year, month) < (now.year(), now.month()) {
            return Err(PaymentError::validation("expiry", "card has expired"));
        }
        Ok(())
    }

    /// Three or four digits.
    pub fn cvv(cvv: &str) -> PaymentResult<()> {
        if !(3..=4).contains(&cvv.len()) || !cvv.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PaymentError::validation("cvv", "CVV must be 3 or 4 digits"));
        }
        Ok(())
    }

    /// Strictly positive and within the configured ceiling.
    pub fn amount(amount: Decimal, max: Option<Decimal>) -> PaymentResult<()> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::validation("amount", "amount must be greater than zero"));
        }
        if let Some(max) = max {
            if amount > max {
                return Err(PaymentError::validation(
                    "amount",
                    format!("amount exceeds the maximum of {max}"),
                ));
            }
        }
        Ok(())
    }

    /// Three uppercase letters, optionally restricted to an allow-list.
    pub fn currency(code: &str, allowed: &[String]) -> PaymentResult<()> {
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(PaymentError::validation(
                "currency",
                "currency must be a three-letter ISO 4217 code",
            ));
        }
        if !allowed.is_empty() && !allowed.iter().any(|c| c == code) {
            return Err(PaymentError::validation(
                "currency",
                format!("currency {code} is not supported"),
            ));
        }
        Ok(())
    }
}

//! Payment status value object.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a single logical payment.
///
/// `Pending → Processing → {Succeeded, Failed}`; `Pending → Failed` covers
/// requests that never reach the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Created locally, not yet submitted.
    #[default]
    Pending,
    /// Submission (and any retries) in progress.
    Processing,
    /// Accepted by the gateway.
    Succeeded,
    /// Rejected, failed, or abandoned.
    Failed,
}

impl PaymentStatus {
    /// Checks if the payment has reached its final state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Checks whether moving to `next` is a legal lifecycle step.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Failed)
                | (Self::Processing, Self::Succeeded)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

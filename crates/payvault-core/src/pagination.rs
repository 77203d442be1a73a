//! Pagination parameters for payment history.

use crate::{PaymentError, PaymentResult};
use serde::{Deserialize, Serialize};

/// A validated request for one page of payment history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// The page number (1-indexed).
    pub page: u32,
    /// The number of items per page.
    pub limit: u32,
}

impl HistoryQuery {
    /// The default page size.
    pub const DEFAULT_LIMIT: u32 = 20;
    /// The maximum allowed page size.
    pub const MAX_LIMIT: u32 = 100;

    /// Creates a query, rejecting out-of-range values.
    pub fn new(page: u32, limit: u32) -> PaymentResult<Self> {
        if page < 1 {
            return Err(PaymentError::validation("page", "page must be at least 1"));
        }
        if limit < 1 || limit > Self::MAX_LIMIT {
            return Err(PaymentError::validation(
                "limit",
                format!("limit must be between 1 and {}", Self::MAX_LIMIT),
            ));
        }
        Ok(Self { page, limit })
    }

    /// The first page with the default size.
    #[must_use]
    pub const fn first() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    /// Number of items preceding this page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self::first()
    }
}

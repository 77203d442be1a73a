//! Paginated payment history.

use super::Payment;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One page of payment history as returned by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentHistoryPage {
    /// 1-based page number.
    pub page: u32,
    /// Page size requested.
    pub limit: u32,
    /// Payments on this page, newest first.
    pub items: Vec<Payment>,
    /// Total number of payments across all pages.
    pub total: u64,
    /// When this page was fetched from the gateway.
    pub fetched_at: DateTime<Utc>,
}

impl PaymentHistoryPage {
    /// Restores the newest-first ordering of `items`.
    pub fn sort_newest_first(&mut self) {
        self.items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    /// A page is fresh iff `now - fetched_at < ttl`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}

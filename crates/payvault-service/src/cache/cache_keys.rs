//! Cache key generators for consistent key naming.

use payvault_core::{HistoryQuery, PaymentId};

/// Prefix for all cache keys to namespace them.
const CACHE_PREFIX: &str = "payvault:cache";

/// Generate a cache key for a payment by ID.
#[must_use]
pub fn payment_by_id(id: &PaymentId) -> String {
    format!("{}:payment:id:{}", CACHE_PREFIX, id)
}

/// Generate a cache key for one page of history.
#[must_use]
pub fn history_page(query: &HistoryQuery) -> String {
    format!(
        "{}:history:page:{}:limit:{}",
        CACHE_PREFIX, query.page, query.limit
    )
}

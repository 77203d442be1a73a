//! Timestamped cache entry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A cached value together with the instant it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Wraps a value fetched at `fetched_at`.
    #[must_use]
    pub fn new(value: T, fetched_at: DateTime<Utc>) -> Self {
        Self { value, fetched_at }
    }

    /// Valid iff `now - fetched_at < ttl`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}

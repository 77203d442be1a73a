//! Ports to the collaborators PayVault consumes.
//!
//! The remote payment gateway and the optional persistent cache backing
//! are reached only through these traits, so each can be swapped for an
//! HTTP adapter, a file store, or a scripted fake in tests.

use crate::{
    CacheEntry, EncryptedPaymentRequest, GatewayReceipt, IdempotencyKey, Payment,
    PaymentHistoryPage, PaymentId, PaymentResult,
};
use async_trait::async_trait;

/// Remote payment gateway.
///
/// Implementations enforce their own transport timeout and report it as
/// `PaymentError::Timeout`; connectivity failures are `PaymentError::Network`.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Submits an encrypted payment. Every attempt for one logical payment
    /// carries the same idempotency key.
    async fn submit(
        &self,
        request: &EncryptedPaymentRequest,
        idempotency_key: &IdempotencyKey,
    ) -> PaymentResult<GatewayReceipt>;

    /// Fetches one page of history.
    async fn fetch_history(&self, page: u32, limit: u32) -> PaymentResult<PaymentHistoryPage>;

    /// Fetches a single payment.
    async fn fetch_by_id(&self, id: &PaymentId) -> PaymentResult<Payment>;
}

/// Durable backing for the local cache.
///
/// Values are the JSON text the cache stores in memory.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Loads an entry, `None` if absent.
    async fn load_entry(&self, key: &str) -> PaymentResult<Option<CacheEntry<String>>>;

    /// Inserts or overwrites an entry.
    async fn save_entry(&self, key: &str, entry: &CacheEntry<String>) -> PaymentResult<()>;

    /// Removes an entry. Removing a missing key is not an error.
    async fn delete_entry(&self, key: &str) -> PaymentResult<()>;

    /// Removes every entry.
    async fn delete_all(&self) -> PaymentResult<()>;
}

//! Payment service trait definition.

use async_trait::async_trait;
use payvault_core::{IdempotencyKey, Payment, PaymentHistoryPage, PaymentRequest, PaymentResult};

/// Payment service trait.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Validates, encrypts and submits a payment, caching the accepted record.
    async fn process_payment(&self, request: PaymentRequest) -> PaymentResult<Payment>;

    /// Returns one page of history, from cache while fresh.
    async fn get_payment_history(&self, page: u32, limit: u32) -> PaymentResult<PaymentHistoryPage>;

    /// Returns a single payment, from cache while fresh.
    async fn get_payment_by_id(&self, id: &str) -> PaymentResult<Payment>;

    /// Aborts the in-flight submission for `key`. Returns `false` if none.
    fn cancel_payment(&self, key: &IdempotencyKey) -> bool;

    /// Cancels pending submissions and wipes every cached record.
    async fn clear_local_data(&self) -> PaymentResult<()>;
}

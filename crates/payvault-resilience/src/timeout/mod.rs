//! Deadline wrapper for async operations.

use payvault_core::{PaymentError, PaymentResult};
use std::time::Duration;

/// Wraps an async operation with a deadline, failing with `Timeout`.
pub async fn with_timeout<F, Fut, T>(duration: Duration, f: F) -> PaymentResult<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = PaymentResult<T>>,
{
    tokio::time::timeout(duration, f())
        .await
        .map_err(|_| PaymentError::Timeout(format!("Operation timed out after {:?}", duration)))?
}

/// Runs `fut` under `deadline` when one is set.
pub async fn with_optional_timeout<Fut, T>(deadline: Option<Duration>, fut: Fut) -> PaymentResult<T>
where
    Fut: std::future::Future<Output = PaymentResult<T>>,
{
    match deadline {
        Some(duration) => with_timeout(duration, || fut).await,
        None => fut.await,
    }
}

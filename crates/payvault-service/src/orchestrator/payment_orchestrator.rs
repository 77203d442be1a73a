//! Payment orchestration: validation, encryption, submission and caching.

use crate::cache::{cache_keys, FileCacheStore, LocalCache};
use crate::payment_service::PaymentService;
use async_trait::async_trait;
use payvault_config::AppConfig;
use payvault_core::{
    Clock, EncryptedPaymentRequest, GatewayClient, HistoryQuery, IdempotencyKey, Payment,
    PaymentError, PaymentHistoryPage, PaymentId, PaymentRequest, PaymentResult, PaymentStatus,
    ValidationRules, Validator,
};
use payvault_resilience::{CoordinatorConfig, RetryCoordinator, RetryPolicy};
use payvault_security::{mask_pan, CryptoGuard, KeyStore, StaticKeyStore, SymmetricKey};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Orchestrator settings.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub validation: ValidationRules,
    pub coordinator: CoordinatorConfig,
}

/// Default [`PaymentService`] implementation.
pub struct PaymentOrchestrator {
    validator: Validator,
    crypto: CryptoGuard,
    coordinator: RetryCoordinator,
    gateway: Arc<dyn GatewayClient>,
    cache: Arc<LocalCache>,
    clock: Arc<dyn Clock>,
}

impl PaymentOrchestrator {
    /// Creates a new orchestrator.
    pub fn new(
        gateway: Arc<dyn GatewayClient>,
        key_store: Arc<dyn KeyStore>,
        cache: Arc<LocalCache>,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            validator: Validator::new(config.validation),
            crypto: CryptoGuard::new(key_store),
            coordinator: RetryCoordinator::with_config(Arc::clone(&gateway), config.coordinator),
            gateway,
            cache,
            clock,
        }
    }

    /// Wires an orchestrator from application configuration.
    pub fn from_config(
        config: &AppConfig,
        gateway: Arc<dyn GatewayClient>,
        clock: Arc<dyn Clock>,
    ) -> PaymentResult<Self> {
        let key_store: Arc<dyn KeyStore> = match &config.security.encryption_key {
            Some(key) => Arc::new(StaticKeyStore::from_base64(key)?),
            None => {
                warn!("No encryption key configured; using an ephemeral key for this process");
                Arc::new(StaticKeyStore::new(SymmetricKey::generate()))
            }
        };

        let ttl = chrono::Duration::from_std(config.cache.ttl())
            .map_err(|e| PaymentError::Configuration(format!("Invalid cache TTL: {}", e)))?;
        let mut cache = LocalCache::with_clock(ttl, Arc::clone(&clock));
        if let Some(path) = &config.cache.persistence_path {
            info!("Persisting cache to {}", path.display());
            cache = cache.with_store(Arc::new(FileCacheStore::new(path)));
        }

        let settings = OrchestratorConfig {
            validation: ValidationRules {
                max_amount: config.validation.max_amount,
                allowed_currencies: config.validation.allowed_currencies.clone(),
            },
            coordinator: CoordinatorConfig {
                retry: RetryPolicy {
                    max_attempts: config.retry.max_attempts,
                    base_delay: config.retry.base_delay(),
                    max_delay: config.retry.max_delay(),
                    ..RetryPolicy::default()
                },
                operation_timeout: config.retry.operation_timeout(),
                idempotency_window: config.retry.idempotency_window(),
            },
        };

        Ok(Self::new(gateway, key_store, Arc::new(cache), clock, settings))
    }

    /// The cache this orchestrator writes through.
    #[must_use]
    pub fn cache(&self) -> &Arc<LocalCache> {
        &self.cache
    }

    fn encrypt(
        &self,
        request: &PaymentRequest,
        payment_id: &PaymentId,
        key: &IdempotencyKey,
    ) -> PaymentResult<EncryptedPaymentRequest> {
        Ok(EncryptedPaymentRequest {
            payment_id: payment_id.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            encrypted_card_number: self.crypto.encrypt_field(&request.card_number)?,
            encrypted_cvv: self.crypto.encrypt_field(&request.cvv)?,
            expiry_month: request.expiry_month,
            expiry_year: request.expiry_year,
            idempotency_key: key.clone(),
            description: request.description.clone(),
        })
    }

    /// Reads a cached value, treating unreadable entries as misses.
    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get::<T>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Discarding unreadable cache entry '{}': {}", key, e);
                if let Err(e) = self.cache.invalidate(key).await {
                    warn!("Failed to invalidate cache entry '{}': {}", key, e);
                }
                None
            }
        }
    }

    /// Writes through to the cache unless it was cleared after `generation`
    /// was read. Failures only cost a future refetch.
    async fn write_through<T: Serialize>(&self, generation: u64, key: &str, value: &T) {
        match self.cache.put_if_current(generation, key, value).await {
            Ok(true) => {}
            Ok(false) => debug!("Local data was cleared; not caching '{}'", key),
            Err(e) => warn!("Cache write failed for key '{}': {}", key, e),
        }
    }

    fn mask_token(&self, token: &str) -> PaymentResult<String> {
        self.crypto.with_decrypted(token, mask_pan)
    }

    async fn submit(
        &self,
        mut payment: Payment,
        request: PaymentRequest,
        generation: u64,
    ) -> PaymentResult<Payment> {
        let key = request.idempotency_key.clone().unwrap_or_default();

        let encrypted = match self.encrypt(&request, &payment.id, &key) {
            Ok(encrypted) => encrypted,
            Err(e) => {
                payment.transition_to(PaymentStatus::Failed)?;
                warn!(payment_id = %payment.id, error = %e, "Payment could not be encrypted");
                return Err(e);
            }
        };
        drop(request);

        payment.card_number_token = encrypted.encrypted_card_number.clone();
        payment.transition_to(PaymentStatus::Processing)?;

        let outcome = match self.coordinator.submit(encrypted, key).await {
            Ok(submission) => {
                payment.attempts = submission.attempts;
                payment.id = submission.receipt.payment_id;
                if let Some(echo) = submission.receipt.card_number_echo {
                    payment.card_number_token = echo;
                }
                self.mask_token(&payment.card_number_token)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(masked) => {
                payment.masked_card_number = Some(masked);
                payment.transition_to(PaymentStatus::Succeeded)?;
                payment.cached_at = Some(self.clock.now());
                self.write_through(generation, &cache_keys::payment_by_id(&payment.id), &payment)
                    .await;

                info!(
                    payment_id = %payment.id,
                    card = payment.masked_card_number.as_deref().unwrap_or_default(),
                    attempts = payment.attempts,
                    "Payment succeeded"
                );
                Ok(payment)
            }
            Err(e) => {
                payment.transition_to(PaymentStatus::Failed)?;
                warn!(
                    payment_id = %payment.id,
                    code = e.error_code(),
                    error = %e,
                    "Payment failed"
                );
                Err(e)
            }
        }
    }
}

#[async_trait]
impl PaymentService for PaymentOrchestrator {
    async fn process_payment(&self, request: PaymentRequest) -> PaymentResult<Payment> {
        let now = self.clock.now();
        let generation = self.cache.generation();

        if let Err(e) = self.validator.validate(&request, now) {
            debug!(field = e.field().unwrap_or_default(), "Payment request rejected");
            return Err(e);
        }

        let payment = Payment::pending(
            PaymentId::generate(),
            request.amount,
            request.currency.clone(),
            String::new(),
            request.expiry_month,
            request.expiry_year,
            now,
        );
        debug!(payment_id = %payment.id, amount = %payment.amount, currency = %payment.currency, "Processing payment");

        self.submit(payment, request, generation).await
    }

    async fn get_payment_history(&self, page: u32, limit: u32) -> PaymentResult<PaymentHistoryPage> {
        let query = HistoryQuery::new(page, limit)?;
        let key = cache_keys::history_page(&query);
        let generation = self.cache.generation();

        if let Some(cached) = self.cached::<PaymentHistoryPage>(&key).await {
            return Ok(cached);
        }

        debug!("Fetching history page {} (limit {})", query.page, query.limit);
        let mut history = self.gateway.fetch_history(query.page, query.limit).await?;
        history.sort_newest_first();
        history.fetched_at = self.clock.now();

        for item in history.items.iter_mut().filter(|p| p.masked_card_number.is_none()) {
            match self.mask_token(&item.card_number_token) {
                Ok(masked) => item.masked_card_number = Some(masked),
                Err(e) => debug!(payment_id = %item.id, "No display form for card: {}", e),
            }
        }

        self.write_through(generation, &key, &history).await;
        Ok(history)
    }

    async fn get_payment_by_id(&self, id: &str) -> PaymentResult<Payment> {
        let id = PaymentId::parse(id)?;
        let key = cache_keys::payment_by_id(&id);
        let generation = self.cache.generation();

        if let Some(cached) = self.cached::<Payment>(&key).await {
            return Ok(cached);
        }

        debug!(payment_id = %id, "Fetching payment from gateway");
        let mut payment = self.gateway.fetch_by_id(&id).await?;
        payment.masked_card_number = Some(self.mask_token(&payment.card_number_token)?);
        payment.cached_at = Some(self.clock.now());

        self.write_through(generation, &key, &payment).await;
        Ok(payment)
    }

    fn cancel_payment(&self, key: &IdempotencyKey) -> bool {
        self.coordinator.cancel(key)
    }

    async fn clear_local_data(&self) -> PaymentResult<()> {
        let cancelled = self.coordinator.cancel_all();
        self.coordinator.clear_recent();
        self.cache.clear().await?;
        info!(cancelled, "Local payment data cleared");
        Ok(())
    }
}

impl std::fmt::Debug for PaymentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentOrchestrator")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payvault_core::{
        CacheEntry, GatewayReceipt, ManualClock, PersistentStore, SystemClock,
    };
    use payvault_security::KEY_LEN;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Mock gateway that accepts everything and counts calls.
    struct MockGateway {
        submits: AtomicU32,
        fetches: AtomicU32,
        stored: Mutex<Option<Payment>>,
    }

    impl MockGateway {
        fn new() -> Self {
            Self {
                submits: AtomicU32::new(0),
                fetches: AtomicU32::new(0),
                stored: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl GatewayClient for MockGateway {
        async fn submit(
            &self,
            request: &EncryptedPaymentRequest,
            _idempotency_key: &IdempotencyKey,
        ) -> PaymentResult<GatewayReceipt> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            Ok(GatewayReceipt {
                payment_id: request.payment_id.clone(),
                card_number_echo: Some(request.encrypted_card_number.clone()),
                processed_at: chrono::Utc::now(),
            })
        }

        async fn fetch_history(&self, page: u32, limit: u32) -> PaymentResult<PaymentHistoryPage> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(PaymentHistoryPage {
                page,
                limit,
                items: Vec::new(),
                total: 0,
                fetched_at: chrono::Utc::now(),
            })
        }

        async fn fetch_by_id(&self, id: &PaymentId) -> PaymentResult<Payment> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.stored
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| PaymentError::not_found("Payment", id))
        }
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl PersistentStore for BrokenStore {
        async fn load_entry(&self, _key: &str) -> PaymentResult<Option<CacheEntry<String>>> {
            Ok(None)
        }

        async fn save_entry(&self, _key: &str, _entry: &CacheEntry<String>) -> PaymentResult<()> {
            Err(PaymentError::Cache("read-only filesystem".to_string()))
        }

        async fn delete_entry(&self, _key: &str) -> PaymentResult<()> {
            Ok(())
        }

        async fn delete_all(&self) -> PaymentResult<()> {
            Err(PaymentError::Cache("read-only filesystem".to_string()))
        }
    }

    /// Store that accepts writes but refuses deletes.
    struct UndeletableStore;

    #[async_trait]
    impl PersistentStore for UndeletableStore {
        async fn load_entry(&self, _key: &str) -> PaymentResult<Option<CacheEntry<String>>> {
            Ok(None)
        }

        async fn save_entry(&self, _key: &str, _entry: &CacheEntry<String>) -> PaymentResult<()> {
            Ok(())
        }

        async fn delete_entry(&self, _key: &str) -> PaymentResult<()> {
            Err(PaymentError::Cache("permission denied".to_string()))
        }

        async fn delete_all(&self) -> PaymentResult<()> {
            Ok(())
        }
    }

    fn key_store() -> Arc<dyn KeyStore> {
        Arc::new(StaticKeyStore::new(SymmetricKey::from_bytes([5u8; KEY_LEN])))
    }

    fn orchestrator_with(gateway: Arc<MockGateway>, cache: LocalCache) -> PaymentOrchestrator {
        PaymentOrchestrator::new(
            gateway,
            key_store(),
            Arc::new(cache),
            Arc::new(SystemClock),
            OrchestratorConfig::default(),
        )
    }

    fn request() -> PaymentRequest {
        PaymentRequest::new(dec!(100.00), "USD", "4532015112830366", 12, 2030, "123")
    }

    #[tokio::test]
    async fn test_cache_write_failure_does_not_fail_payment() {
        let gateway = Arc::new(MockGateway::new());
        let cache = LocalCache::new().with_store(Arc::new(BrokenStore));
        let orchestrator = orchestrator_with(gateway.clone(), cache);

        let payment = orchestrator.process_payment(request()).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert_eq!(payment.masked_card_number.as_deref(), Some("**** **** **** 0366"));
        assert_eq!(gateway.submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_local_data_surfaces_store_failure() {
        let gateway = Arc::new(MockGateway::new());
        let cache = LocalCache::new().with_store(Arc::new(BrokenStore));
        let orchestrator = orchestrator_with(gateway, cache);

        let err = orchestrator.clear_local_data().await.unwrap_err();
        assert!(matches!(err, PaymentError::Cache(_)));
    }

    #[tokio::test]
    async fn test_unreadable_cache_entry_is_refetched() {
        let gateway = Arc::new(MockGateway::new());
        let orchestrator = orchestrator_with(gateway.clone(), LocalCache::new());

        let key = cache_keys::history_page(&HistoryQuery::new(1, 10).unwrap());
        orchestrator.cache().put(&key, &"not a page").await.unwrap();

        let page = orchestrator.get_payment_history(1, 10).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(gateway.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreadable_entry_refetched_when_delete_fails() {
        let gateway = Arc::new(MockGateway::new());
        let cache = LocalCache::new().with_store(Arc::new(UndeletableStore));
        let orchestrator = orchestrator_with(gateway.clone(), cache);

        let key = cache_keys::history_page(&HistoryQuery::new(1, 10).unwrap());
        orchestrator.cache().put(&key, &"not a page").await.unwrap();

        let page = orchestrator.get_payment_history(1, 10).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(gateway.fetches.load(Ordering::SeqCst), 1);

        // The refetched page replaced the unreadable one.
        orchestrator.get_payment_history(1, 10).await.unwrap();
        assert_eq!(gateway.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetched_payment_gets_display_mask() {
        let gateway = Arc::new(MockGateway::new());
        let orchestrator = orchestrator_with(gateway.clone(), LocalCache::new());

        let token = orchestrator.crypto.encrypt_field("4111111111111111").unwrap();
        let mut stored = Payment::pending(
            PaymentId::parse("pay-9").unwrap(),
            dec!(12.50),
            "EUR".to_string(),
            token,
            3,
            2031,
            chrono::Utc::now(),
        );
        stored.status = PaymentStatus::Succeeded;
        *gateway.stored.lock().unwrap() = Some(stored);

        let payment = orchestrator.get_payment_by_id("pay-9").await.unwrap();
        assert_eq!(payment.masked_card_number.as_deref(), Some("**** **** **** 1111"));
        assert!(payment.cached_at.is_some());

        orchestrator.get_payment_by_id("pay-9").await.unwrap();
        assert_eq!(gateway.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_query_rejected_before_cache() {
        let gateway = Arc::new(MockGateway::new());
        let orchestrator = orchestrator_with(gateway.clone(), LocalCache::new());

        let err = orchestrator.get_payment_history(0, 10).await.unwrap_err();
        assert_eq!(err.field(), Some("page"));
        let err = orchestrator.get_payment_history(1, 101).await.unwrap_err();
        assert_eq!(err.field(), Some("limit"));

        assert_eq!(gateway.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(orchestrator.cache().stats(), Default::default());
    }

    #[tokio::test]
    async fn test_from_config_wires_limits() {
        let mut config = AppConfig::default();
        config.validation.max_amount = Some(dec!(50));

        let gateway = Arc::new(MockGateway::new());
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let orchestrator = PaymentOrchestrator::from_config(&config, gateway.clone(), clock).unwrap();

        let err = orchestrator.process_payment(request()).await.unwrap_err();
        assert_eq!(err.field(), Some("amount"));
        assert_eq!(gateway.submits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_from_config_rejects_bad_key() {
        let mut config = AppConfig::default();
        config.security.encryption_key = Some("too-short".to_string());

        let result = PaymentOrchestrator::from_config(
            &config,
            Arc::new(MockGateway::new()),
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(PaymentError::Security { .. })));
    }
}

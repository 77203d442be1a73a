//! Shared fixtures for orchestrator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use payvault_core::{
    Clock, EncryptedPaymentRequest, GatewayClient, GatewayReceipt, IdempotencyKey, ManualClock,
    Payment, PaymentError, PaymentHistoryPage, PaymentId, PaymentRequest, PaymentResult,
    PaymentStatus,
};
use payvault_security::{CryptoGuard, KeyStore, StaticKeyStore, SymmetricKey, KEY_LEN};
use payvault_service::{LocalCache, OrchestratorConfig, PaymentOrchestrator};
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const VALID_PAN: &str = "4532015112830366";
pub const VALID_CVV: &str = "9731";

/// In-process gateway with scripted failures and call counters.
#[derive(Default)]
pub struct FakeGateway {
    submit_calls: AtomicU32,
    fetch_calls: AtomicU32,
    failures: Mutex<VecDeque<PaymentError>>,
    submit_delay: Mutex<Option<Duration>>,
    submitted: Mutex<Vec<EncryptedPaymentRequest>>,
    history: Mutex<Vec<Payment>>,
    payments: Mutex<HashMap<PaymentId, Payment>>,
    gate_fetches: AtomicBool,
    fetch_entered: Notify,
    fetch_release: Notify,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues errors returned by the next submits, in order.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = PaymentError>) {
        self.failures.lock().unwrap().extend(errors);
    }

    pub fn delay_submits(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_history(&self, items: Vec<Payment>) {
        *self.history.lock().unwrap() = items;
    }

    pub fn insert_payment(&self, payment: Payment) {
        self.payments.lock().unwrap().insert(payment.id.clone(), payment);
    }

    /// Parks every `fetch_by_id` after it has its answer until
    /// [`Self::release_fetch`] is called.
    pub fn gate_fetches(&self) {
        self.gate_fetches.store(true, Ordering::SeqCst);
    }

    pub async fn fetch_started(&self) {
        self.fetch_entered.notified().await;
    }

    pub fn release_fetch(&self) {
        self.fetch_release.notify_one();
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<EncryptedPaymentRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl GatewayClient for FakeGateway {
    async fn submit(
        &self,
        request: &EncryptedPaymentRequest,
        idempotency_key: &IdempotencyKey,
    ) -> PaymentResult<GatewayReceipt> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(&request.idempotency_key, idempotency_key);

        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.submitted.lock().unwrap().push(request.clone());
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        Ok(GatewayReceipt {
            payment_id: request.payment_id.clone(),
            card_number_echo: Some(request.encrypted_card_number.clone()),
            processed_at: Utc::now(),
        })
    }

    async fn fetch_history(&self, page: u32, limit: u32) -> PaymentResult<PaymentHistoryPage> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let items = self.history.lock().unwrap().clone();
        Ok(PaymentHistoryPage {
            page,
            limit,
            total: items.len() as u64,
            items,
            fetched_at: Utc::now(),
        })
    }

    async fn fetch_by_id(&self, id: &PaymentId) -> PaymentResult<Payment> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let found = self.payments.lock().unwrap().get(id).cloned();

        if self.gate_fetches.load(Ordering::SeqCst) {
            self.fetch_entered.notify_one();
            self.fetch_release.notified().await;
        }

        found.ok_or_else(|| PaymentError::not_found("Payment", id))
    }
}

/// An orchestrator wired to fakes, plus handles to inspect them.
pub struct Harness {
    pub gateway: Arc<FakeGateway>,
    pub clock: Arc<ManualClock>,
    pub cache: Arc<LocalCache>,
    pub key_store: Arc<dyn KeyStore>,
    pub service: Arc<PaymentOrchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    pub fn with_config(config: OrchestratorConfig) -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let cache = LocalCache::with_clock(payvault_service::DEFAULT_TTL, clock.clone());
        Self::assemble(clock, cache, test_key_store(), config)
    }

    pub fn assemble(
        clock: Arc<ManualClock>,
        cache: LocalCache,
        key_store: Arc<dyn KeyStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let gateway = Arc::new(FakeGateway::new());
        let cache = Arc::new(cache);
        let service = Arc::new(PaymentOrchestrator::new(
            gateway.clone(),
            key_store.clone(),
            cache.clone(),
            clock.clone() as Arc<dyn Clock>,
            config,
        ));

        Self {
            gateway,
            clock,
            cache,
            key_store,
            service,
        }
    }

    pub fn crypto(&self) -> CryptoGuard {
        CryptoGuard::new(self.key_store.clone())
    }

    /// A settled payment as the gateway would return it.
    pub fn stored_payment(&self, id: &str, pan: &str, created_at_secs: i64) -> Payment {
        let token = self.crypto().encrypt_field(pan).unwrap();
        let mut payment = Payment::pending(
            PaymentId::parse(id).unwrap(),
            dec!(25.00),
            "USD".to_string(),
            token,
            6,
            2029,
            Utc.timestamp_opt(created_at_secs, 0).unwrap(),
        );
        payment.transition_to(PaymentStatus::Processing).unwrap();
        payment.transition_to(PaymentStatus::Succeeded).unwrap();
        payment
    }
}

pub fn start_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub fn test_key_store() -> Arc<dyn KeyStore> {
    Arc::new(StaticKeyStore::new(SymmetricKey::from_bytes([42u8; KEY_LEN])))
}

pub fn valid_request() -> PaymentRequest {
    PaymentRequest::new(dec!(100.00), "USD", VALID_PAN, 12, 2030, VALID_CVV)
}

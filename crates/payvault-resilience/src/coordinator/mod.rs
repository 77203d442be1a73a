//! Idempotent, bounded-retry submission to the payment gateway.
//!
//! Each logical submission runs in its own spawned task. Callers that arrive
//! with an idempotency key already in flight join the existing task's shared
//! result instead of issuing a second request. Aborting the task cancels any
//! pending retry timer and resolves every waiter with `Cancelled`.

use crate::{with_optional_timeout, RetryPolicy};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use payvault_core::{
    EncryptedPaymentRequest, GatewayClient, GatewayReceipt, IdempotencyKey, PaymentError,
    PaymentResult,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub receipt: GatewayReceipt,
    /// Gateway attempts spent, including the successful one.
    pub attempts: u32,
}

/// Coordinator settings.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub retry: RetryPolicy,
    /// Deadline for the whole retry loop. Unbounded when `None`.
    pub operation_timeout: Option<Duration>,
    /// How long a successful result is replayed for its key.
    pub idempotency_window: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            operation_timeout: None,
            idempotency_window: Duration::from_secs(600),
        }
    }
}

type SharedSubmission = Shared<BoxFuture<'static, PaymentResult<Submission>>>;

struct InFlight {
    generation: u64,
    result: SharedSubmission,
    abort: AbortHandle,
}

struct Completed {
    submission: Submission,
    at: Instant,
}

#[derive(Default)]
struct CoordinatorState {
    in_flight: HashMap<IdempotencyKey, InFlight>,
    recent: HashMap<IdempotencyKey, Completed>,
    next_generation: u64,
}

impl CoordinatorState {
    fn prune_recent(&mut self, window: Duration) {
        let now = Instant::now();
        self.recent.retain(|_, done| now.duration_since(done.at) < window);
    }
}

/// Submits encrypted payments with retry, deduplication and cancellation.
pub struct RetryCoordinator {
    gateway: Arc<dyn GatewayClient>,
    config: CoordinatorConfig,
    state: Arc<Mutex<CoordinatorState>>,
}

impl RetryCoordinator {
    /// Creates a coordinator with default settings.
    #[must_use]
    pub fn new(gateway: Arc<dyn GatewayClient>) -> Self {
        Self::with_config(gateway, CoordinatorConfig::default())
    }

    /// Creates a coordinator with the given settings.
    #[must_use]
    pub fn with_config(gateway: Arc<dyn GatewayClient>, config: CoordinatorConfig) -> Self {
        Self {
            gateway,
            config,
            state: Arc::new(Mutex::new(CoordinatorState::default())),
        }
    }

    /// Submits `request` under `key`.
    ///
    /// Concurrent calls with the same key share one gateway submission. A key
    /// that succeeded within the idempotency window replays its result.
    /// Must be called from within a tokio runtime.
    pub async fn submit(
        &self,
        request: EncryptedPaymentRequest,
        key: IdempotencyKey,
    ) -> PaymentResult<Submission> {
        let result = {
            let mut state = self.state.lock();
            state.prune_recent(self.config.idempotency_window);

            if let Some(done) = state.recent.get(&key) {
                debug!(idempotency_key = %key, "Replaying recent submission");
                return Ok(done.submission.clone());
            }

            match state.in_flight.get(&key) {
                Some(existing) => {
                    debug!(idempotency_key = %key, "Joining in-flight submission");
                    existing.result.clone()
                }
                None => self.start(&mut state, request, key),
            }
        };

        result.await
    }

    /// Spawns the submission task and registers it. Called with the state lock
    /// held, so the task cannot deregister before it is registered.
    fn start(
        &self,
        state: &mut CoordinatorState,
        request: EncryptedPaymentRequest,
        key: IdempotencyKey,
    ) -> SharedSubmission {
        let generation = state.next_generation;
        state.next_generation += 1;

        let gateway = Arc::clone(&self.gateway);
        let policy = self.config.retry.clone();
        let deadline = self.config.operation_timeout;
        let registry = Arc::clone(&self.state);
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            let outcome = with_optional_timeout(
                deadline,
                attempt_submission(gateway, &policy, &request, &task_key),
            )
            .await;

            let mut state = registry.lock();
            if state
                .in_flight
                .get(&task_key)
                .is_some_and(|entry| entry.generation == generation)
            {
                state.in_flight.remove(&task_key);
            }
            if let Ok(submission) = &outcome {
                state.recent.insert(
                    task_key,
                    Completed {
                        submission: submission.clone(),
                        at: Instant::now(),
                    },
                );
            }
            outcome
        });

        let abort = handle.abort_handle();
        let result = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => {
                    Err(PaymentError::Cancelled("submission was cancelled".to_string()))
                }
                Err(e) => Err(PaymentError::internal(format!("submission task failed: {}", e))),
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key,
            InFlight {
                generation,
                result: result.clone(),
                abort,
            },
        );
        result
    }

    /// Cancels the in-flight submission for `key`.
    ///
    /// Returns `false` if nothing was in flight. Every waiter receives
    /// `PaymentError::Cancelled`.
    pub fn cancel(&self, key: &IdempotencyKey) -> bool {
        let entry = self.state.lock().in_flight.remove(key);
        match entry {
            Some(entry) => {
                entry.abort.abort();
                info!(idempotency_key = %key, "Submission cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancels every in-flight submission and returns how many were aborted.
    pub fn cancel_all(&self) -> usize {
        let entries: Vec<_> = self.state.lock().in_flight.drain().collect();
        for (_, entry) in &entries {
            entry.abort.abort();
        }
        if !entries.is_empty() {
            warn!(count = entries.len(), "Cancelled all in-flight submissions");
        }
        entries.len()
    }

    /// Forgets remembered successes.
    pub fn clear_recent(&self) {
        self.state.lock().recent.clear();
    }

    /// Number of submissions currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }
}

impl std::fmt::Debug for RetryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn attempt_submission(
    gateway: Arc<dyn GatewayClient>,
    policy: &RetryPolicy,
    request: &EncryptedPaymentRequest,
    key: &IdempotencyKey,
) -> PaymentResult<Submission> {
    let result = policy
        .execute(|attempt| {
            let gateway = Arc::clone(&gateway);
            async move {
                debug!(
                    payment_id = %request.payment_id,
                    idempotency_key = %key,
                    attempt,
                    "Submitting payment to gateway"
                );
                gateway.submit(request, key).await
            }
        })
        .await;

    match result {
        Ok((receipt, attempts)) => {
            info!(payment_id = %receipt.payment_id, attempts, "Gateway accepted payment");
            Ok(Submission { receipt, attempts })
        }
        Err(e) => {
            warn!(payment_id = %request.payment_id, error = %e, "Gateway submission failed");
            Err(e)
        }
    }
}

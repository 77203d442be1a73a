//! HTTP client for the remote payment gateway.
//!
//! Speaks JSON over HTTP/1.1 and classifies every failure into the
//! `PaymentError` taxonomy, so the retry layer can tell transient transport
//! problems from terminal gateway decisions.

use async_trait::async_trait;
use chrono::Utc;
use payvault_config::GatewayConfig;
use payvault_core::{
    EncryptedPaymentRequest, GatewayClient, GatewayReceipt, IdempotencyKey, Payment, PaymentError,
    PaymentHistoryPage, PaymentId, PaymentResult,
};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Header carrying the submission's idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

const PAYMENTS_PATH: &str = "/v1/payments";

/// HTTP gateway client.
pub struct HttpGatewayClient {
    client: Client,
    base_url: String,
}

impl HttpGatewayClient {
    /// Creates a client with timeouts taken from `config`.
    pub fn from_config(config: &GatewayConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .map_err(|e| PaymentError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, &config.base_url))
    }

    /// Creates a client around a preconfigured `reqwest::Client`.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl std::fmt::Debug for HttpGatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGatewayClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct HttpHistoryResponse {
    page: u32,
    limit: u32,
    #[serde(default)]
    items: Vec<Payment>,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Default, Deserialize)]
struct HttpErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn submit(
        &self,
        request: &EncryptedPaymentRequest,
        idempotency_key: &IdempotencyKey,
    ) -> PaymentResult<GatewayReceipt> {
        debug!(payment_id = %request.payment_id, idempotency_key = %idempotency_key, "HTTP SubmitPayment");

        let response = self
            .client
            .post(self.url(PAYMENTS_PATH))
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key.as_str())
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        handle_response(response).await
    }

    async fn fetch_history(&self, page: u32, limit: u32) -> PaymentResult<PaymentHistoryPage> {
        debug!("HTTP FetchHistory: page={}, limit={}", page, limit);

        let response = self
            .client
            .get(self.url(PAYMENTS_PATH))
            .query(&[("page", page.to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .map_err(map_transport_error)?;

        let body: HttpHistoryResponse = handle_response(response).await?;
        Ok(PaymentHistoryPage {
            page: body.page,
            limit: body.limit,
            items: body.items,
            total: body.total,
            fetched_at: Utc::now(),
        })
    }

    async fn fetch_by_id(&self, id: &PaymentId) -> PaymentResult<Payment> {
        debug!("HTTP FetchPayment: {}", id);

        let response = self
            .client
            .get(self.url(&format!("{}/{}", PAYMENTS_PATH, id)))
            .send()
            .await
            .map_err(map_transport_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(PaymentError::not_found("Payment", id)),
            _ => handle_response(response).await,
        }
    }
}

/// Creates a shareable gateway client from configuration.
pub fn create_http_gateway(config: &GatewayConfig) -> PaymentResult<Arc<dyn GatewayClient>> {
    Ok(Arc::new(HttpGatewayClient::from_config(config)?))
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> PaymentResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(map_http_error(status, &body));
    }

    response.json().await.map_err(|e| {
        warn!("Gateway returned an unreadable body: {}", e);
        PaymentError::gateway("INVALID_RESPONSE", format!("JSON parse error: {}", e))
    })
}

/// Classifies a failure that happened before a status code was received.
fn map_transport_error(err: reqwest::Error) -> PaymentError {
    if err.is_timeout() {
        PaymentError::Timeout(format!("Gateway request timed out: {}", err))
    } else {
        PaymentError::Network(format!("HTTP error: {}", err))
    }
}

fn map_http_error(status: StatusCode, body: &str) -> PaymentError {
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            PaymentError::Network(format!("Gateway unavailable ({})", status))
        }
        StatusCode::REQUEST_TIMEOUT => PaymentError::Timeout(format!("Gateway returned {}", status)),
        StatusCode::NOT_FOUND => PaymentError::not_found("Resource", "unknown"),
        _ => {
            let parsed: HttpErrorBody = serde_json::from_str(body).unwrap_or_default();
            PaymentError::gateway(
                parsed.code.unwrap_or_else(|| format!("HTTP_{}", status.as_u16())),
                parsed.message.unwrap_or_else(|| body.to_string()),
            )
        }
    }
}

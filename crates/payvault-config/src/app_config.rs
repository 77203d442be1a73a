//! Application configuration structures.

use payvault_core::telemetry::{LogFormat, TelemetryConfig};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Remote gateway connection.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Submission retry and idempotency.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Local cache.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Request validation limits.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Encryption key material.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment (development, staging, production).
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "payvault".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the payment gateway API.
    pub base_url: String,
    /// Per-request transport timeout in seconds.
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl GatewayConfig {
    /// Returns the request timeout as a Duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns the connect timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per submission, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,
    /// Ceiling on any single delay in milliseconds.
    pub max_delay_ms: u64,
    /// Deadline for the whole retry loop. Unbounded when absent.
    pub operation_timeout_secs: Option<u64>,
    /// How long a successful submission is replayed for its key.
    pub idempotency_window_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            operation_timeout_secs: None,
            idempotency_window_secs: 600,
        }
    }
}

impl RetryConfig {
    /// Returns the base delay as a Duration.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Returns the maximum delay as a Duration.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Returns the operation timeout as a Duration, if set.
    #[must_use]
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }

    /// Returns the idempotency window as a Duration.
    #[must_use]
    pub const fn idempotency_window(&self) -> Duration {
        Duration::from_secs(self.idempotency_window_secs)
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Freshness window in seconds.
    pub ttl_secs: u64,
    /// File backing the cache across sessions. In-memory only when absent.
    pub persistence_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 86_400, // 24 hours
            persistence_path: None,
        }
    }
}

impl CacheConfig {
    /// Returns the TTL as a Duration.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ValidationConfig {
    /// Largest accepted amount. Unbounded when absent.
    pub max_amount: Option<Decimal>,
    /// Accepted ISO-4217 codes. Any code when empty.
    pub allowed_currencies: Vec<String>,
}

/// Security configuration.
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// Base64 AES-256 key. A random per-process key is generated when absent.
    pub encryption_key: Option<String>,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format (text, json).
    pub log_format: LogFormat,
    /// Install a subscriber at startup.
    pub tracing_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            tracing_enabled: true,
        }
    }
}

impl ObservabilityConfig {
    /// Builds the tracing setup for `service_name`.
    #[must_use]
    pub fn telemetry(&self, service_name: &str) -> TelemetryConfig {
        TelemetryConfig {
            enabled: self.tracing_enabled,
            service_name: service_name.to_string(),
            default_filter: format!("{},payvault=debug", self.log_level),
            format: self.log_format,
        }
    }
}

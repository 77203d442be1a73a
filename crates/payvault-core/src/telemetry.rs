//! Tracing subscriber initialization.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a text or
//! JSON formatting layer.

#[cfg(feature = "telemetry")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::PaymentResult;
use serde::{Deserialize, Serialize};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether to install a subscriber at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Service name attached to the startup event.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub default_filter: String,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_enabled() -> bool {
    true
}

fn default_service_name() -> String {
    "payvault".to_string()
}

fn default_filter() -> String {
    "info,payvault=debug".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            service_name: default_service_name(),
            default_filter: default_filter(),
            format: LogFormat::default(),
        }
    }
}

/// Initialize tracing with the given configuration.
///
/// Fails with `Configuration` if a global subscriber is already installed.
#[cfg(feature = "telemetry")]
pub fn init_tracing(config: &TelemetryConfig) -> PaymentResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let installed = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init(),
    };

    installed.map_err(|e| {
        crate::PaymentError::Configuration(format!("Failed to install tracing subscriber: {}", e))
    })?;

    tracing::info!(
        service_name = %config.service_name,
        format = ?config.format,
        "Tracing initialized"
    );

    Ok(())
}

/// Placeholder for when telemetry feature is disabled.
#[cfg(not(feature = "telemetry"))]
pub fn init_tracing(_config: &TelemetryConfig) -> PaymentResult<()> {
    Ok(())
}

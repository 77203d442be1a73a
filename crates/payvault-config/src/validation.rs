//! Configuration validation module.
//!
//! Checks every section and reports all problems at once, so a bad deploy
//! fails at startup instead of on the first payment.

use crate::AppConfig;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rust_decimal::Decimal;
use std::fmt;
use url::Url;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// At least one submission attempt is required.
    InvalidRetryAttempts { value: u32 },
    /// Base retry delay exceeds the configured ceiling.
    InvalidDelayRange { base_ms: u64, max_ms: u64 },
    /// Timeout or window value must be positive.
    NonPositiveTimeout { name: String, value: u64 },
    /// URL format is invalid.
    InvalidUrl { url_type: String, message: String },
    /// Encryption key is not base64 or not 32 bytes.
    InvalidEncryptionKey { message: String },
    /// Configured maximum amount must be positive.
    NonPositiveMaxAmount { value: Decimal },
    /// Allow-listed currency is not a three-letter uppercase code.
    InvalidCurrency { value: String },
    /// Log level is invalid.
    InvalidLogLevel { value: String },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRetryAttempts { value } => {
                write!(f, "retry.max_attempts must be at least 1, got {}", value)
            }
            Self::InvalidDelayRange { base_ms, max_ms } => {
                write!(
                    f,
                    "retry.base_delay_ms ({}) cannot exceed retry.max_delay_ms ({})",
                    base_ms, max_ms
                )
            }
            Self::NonPositiveTimeout { name, value } => {
                write!(f, "Timeout '{}' must be positive, got {}", name, value)
            }
            Self::InvalidUrl { url_type, message } => {
                write!(f, "Invalid {} URL: {}", url_type, message)
            }
            Self::InvalidEncryptionKey { message } => {
                write!(f, "Invalid security.encryption_key: {}", message)
            }
            Self::NonPositiveMaxAmount { value } => {
                write!(f, "validation.max_amount must be positive, got {}", value)
            }
            Self::InvalidCurrency { value } => {
                write!(f, "Invalid currency code in allow-list: '{}'", value)
            }
            Self::InvalidLogLevel { value } => {
                write!(
                    f,
                    "Invalid log level: '{}' (valid: trace, debug, info, warn, error)",
                    value
                )
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Required decoded key length for AES-256.
    const KEY_LEN: usize = 32;
    /// Valid log levels.
    const VALID_LOG_LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error"];

    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        Self::validate_gateway(&config.gateway, &mut errors);
        Self::validate_retry(&config.retry, &mut errors);
        Self::validate_cache(&config.cache, &mut errors);
        Self::validate_limits(&config.validation, &mut errors);
        Self::validate_security(&config.security, &mut errors);
        Self::validate_observability(&config.observability, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_gateway(config: &crate::GatewayConfig, errors: &mut Vec<ConfigValidationError>) {
        match Url::parse(&config.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ConfigValidationError::InvalidUrl {
                url_type: "gateway".to_string(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ConfigValidationError::InvalidUrl {
                url_type: "gateway".to_string(),
                message: e.to_string(),
            }),
        }

        if config.request_timeout_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "gateway.request_timeout_secs".to_string(),
                value: 0,
            });
        }
    }

    fn validate_retry(config: &crate::RetryConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.max_attempts == 0 {
            errors.push(ConfigValidationError::InvalidRetryAttempts {
                value: config.max_attempts,
            });
        }

        if config.base_delay_ms > config.max_delay_ms {
            errors.push(ConfigValidationError::InvalidDelayRange {
                base_ms: config.base_delay_ms,
                max_ms: config.max_delay_ms,
            });
        }

        if config.operation_timeout_secs == Some(0) {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "retry.operation_timeout_secs".to_string(),
                value: 0,
            });
        }
    }

    fn validate_cache(config: &crate::CacheConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.ttl_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "cache.ttl_secs".to_string(),
                value: 0,
            });
        }
    }

    fn validate_limits(config: &crate::ValidationConfig, errors: &mut Vec<ConfigValidationError>) {
        if let Some(max) = config.max_amount {
            if max <= Decimal::ZERO {
                errors.push(ConfigValidationError::NonPositiveMaxAmount { value: max });
            }
        }

        for code in &config.allowed_currencies {
            if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
                errors.push(ConfigValidationError::InvalidCurrency { value: code.clone() });
            }
        }
    }

    fn validate_security(config: &crate::SecurityConfig, errors: &mut Vec<ConfigValidationError>) {
        let Some(key) = &config.encryption_key else {
            return;
        };

        match STANDARD.decode(key.trim()) {
            Ok(bytes) if bytes.len() == Self::KEY_LEN => {}
            Ok(bytes) => errors.push(ConfigValidationError::InvalidEncryptionKey {
                message: format!("decodes to {} bytes, expected {}", bytes.len(), Self::KEY_LEN),
            }),
            Err(e) => errors.push(ConfigValidationError::InvalidEncryptionKey {
                message: e.to_string(),
            }),
        }
    }

    fn validate_observability(
        config: &crate::ObservabilityConfig,
        errors: &mut Vec<ConfigValidationError>,
    ) {
        if !Self::VALID_LOG_LEVELS.contains(&config.log_level.to_lowercase().as_str()) {
            errors.push(ConfigValidationError::InvalidLogLevel {
                value: config.log_level.clone(),
            });
        }
    }
}

/// Joins validation errors into one message.
#[must_use]
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    let lines: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
    format!("Configuration validation failed:\n{}", lines.join("\n"))
}

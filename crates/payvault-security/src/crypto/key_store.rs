//! Symmetric key material and its source.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use payvault_core::{PaymentError, PaymentResult};
use std::fmt;
use zeroize::Zeroizing;

/// Length of an AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// A 256-bit key, zeroed on drop.
#[derive(Clone)]
pub struct SymmetricKey(Zeroizing<[u8; KEY_LEN]>);

impl SymmetricKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Decodes a standard base64 key; it must decode to exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> PaymentResult<Self> {
        let decoded = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|e| {
            PaymentError::security(format!("encryption key is not valid base64: {}", e))
        })?);

        if decoded.len() != KEY_LEN {
            return Err(PaymentError::security(format!(
                "encryption key must be {} bytes, got {}",
                KEY_LEN,
                decoded.len()
            )));
        }

        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }

    /// Generates a random key from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        use aes_gcm_siv::aead::{rand_core::RngCore, OsRng};

        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self(bytes)
    }

    /// The raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Source of the current encryption key.
///
/// Consulted on every encrypt/decrypt call so a platform keystore can rotate
/// or revoke the key without rebuilding the guard.
pub trait KeyStore: Send + Sync {
    /// Returns the key to use for the next operation.
    fn current_key(&self) -> PaymentResult<SymmetricKey>;
}

/// A key store holding one fixed key.
#[derive(Debug, Clone)]
pub struct StaticKeyStore {
    key: SymmetricKey,
}

impl StaticKeyStore {
    /// Creates a store around the given key.
    #[must_use]
    pub fn new(key: SymmetricKey) -> Self {
        Self { key }
    }

    /// Creates a store from a base64 key, as found in configuration.
    pub fn from_base64(encoded: &str) -> PaymentResult<Self> {
        SymmetricKey::from_base64(encoded).map(Self::new)
    }
}

impl KeyStore for StaticKeyStore {
    fn current_key(&self) -> PaymentResult<SymmetricKey> {
        Ok(self.key.clone())
    }
}

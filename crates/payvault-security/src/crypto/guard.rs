//! AES-256-GCM-SIV field encryption.

use super::{KeyStore, SymmetricKey};
use aes_gcm_siv::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use payvault_core::{PaymentError, PaymentResult};
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

/// Nonce length for AES-GCM-SIV.
pub const NONCE_LEN: usize = 12;

/// Authentication tag length appended to every ciphertext.
const TAG_LEN: usize = 16;

/// Encrypts and decrypts individual sensitive fields.
///
/// Output is `base64(nonce || ciphertext || tag)` with a fresh random nonce
/// per call. The key is fetched from the [`KeyStore`] on every call.
#[derive(Clone)]
pub struct CryptoGuard {
    key_store: Arc<dyn KeyStore>,
}

impl CryptoGuard {
    /// Creates a guard backed by the given key store.
    #[must_use]
    pub fn new(key_store: Arc<dyn KeyStore>) -> Self {
        Self { key_store }
    }

    fn cipher(&self) -> PaymentResult<Aes256GcmSiv> {
        let key: SymmetricKey = self.key_store.current_key()?;
        Aes256GcmSiv::new_from_slice(key.as_bytes())
            .map_err(|_| PaymentError::security("encryption key has invalid length"))
    }

    /// Encrypts a plaintext field.
    pub fn encrypt_field(&self, plaintext: &str) -> PaymentResult<String> {
        let cipher = self.cipher()?;
        let nonce = Aes256GcmSiv::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| PaymentError::security("field encryption failed"))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);

        debug!(len = plaintext.len(), "Field encrypted");
        Ok(STANDARD.encode(out))
    }

    /// Decrypts a field produced by [`encrypt_field`](Self::encrypt_field).
    ///
    /// The plaintext is zeroed when the returned buffer is dropped.
    pub fn decrypt_field(&self, encoded: &str) -> PaymentResult<Zeroizing<String>> {
        let raw = STANDARD
            .decode(encoded)
            .map_err(|_| PaymentError::security("ciphertext is not valid base64"))?;

        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(PaymentError::security("ciphertext is too short"));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let cipher = self.cipher()?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| PaymentError::security("ciphertext failed authentication"))?,
        );

        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| PaymentError::security("decrypted field is not UTF-8"))?;

        Ok(Zeroizing::new(text.to_owned()))
    }

    /// Decrypts a field and hands the plaintext to `f`, zeroing it afterwards.
    pub fn with_decrypted<R>(&self, encoded: &str, f: impl FnOnce(&str) -> R) -> PaymentResult<R> {
        let plaintext = self.decrypt_field(encoded)?;
        Ok(f(&plaintext))
    }
}

impl std::fmt::Debug for CryptoGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoGuard").finish_non_exhaustive()
    }
}

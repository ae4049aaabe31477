//! AES-GCM encryption for credential secrets.
//!
//! Stored secrets are base64 of `nonce || ciphertext`, where the nonce is
//! 12 random bytes and the ciphertext carries the GCM tag.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;

use crate::error::{EngineError, EngineResult};

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits / 32 bytes).
const KEY_SIZE: usize = 32;

/// Encryptor for credential secrets.
#[derive(Clone)]
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl Encryptor {
    /// Create a new encryptor from a base64-encoded 32-byte key.
    pub fn from_base64(key_base64: &str) -> EngineResult<Self> {
        let key_bytes = BASE64
            .decode(key_base64.trim())
            .map_err(|e| EngineError::Encryption(format!("Invalid base64 key: {e}")))?;

        Self::from_bytes(&key_bytes)
    }

    /// Create a new encryptor from raw key bytes.
    pub fn from_bytes(key_bytes: &[u8]) -> EngineResult<Self> {
        if key_bytes.len() != KEY_SIZE {
            return Err(EngineError::Encryption(format!(
                "Invalid key length: expected {} bytes, got {}",
                KEY_SIZE,
                key_bytes.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key_bytes)
            .map_err(|e| EngineError::Encryption(format!("Failed to create cipher: {e}")))?;

        Ok(Self { cipher })
    }

    /// Generate a new random key and return it as base64.
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill(&mut key[..]);
        BASE64.encode(key)
    }

    /// Encrypt data and return the ciphertext with prepended nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> EngineResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| EngineError::Encryption(format!("Encryption failed: {e}")))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }

    /// Decrypt data with prepended nonce.
    pub fn decrypt(&self, ciphertext_with_nonce: &[u8]) -> EngineResult<Vec<u8>> {
        if ciphertext_with_nonce.len() < NONCE_SIZE {
            return Err(EngineError::Encryption(
                "Ciphertext too short (missing nonce)".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = ciphertext_with_nonce.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| EngineError::Encryption(format!("Decryption failed: {e}")))
    }

    /// Encrypt a secret into its stored (base64) form.
    pub fn encrypt_secret(&self, secret: &str) -> EngineResult<String> {
        Ok(BASE64.encode(self.encrypt(secret.as_bytes())?))
    }

    /// Decrypt a secret from its stored (base64) form.
    pub fn decrypt_secret(&self, stored: &str) -> EngineResult<String> {
        let bytes = BASE64
            .decode(stored.trim())
            .map_err(|e| EngineError::Encryption(format!("Invalid stored secret: {e}")))?;
        let plaintext = self.decrypt(&bytes)?;
        String::from_utf8(plaintext)
            .map_err(|e| EngineError::Encryption(format!("Secret is not valid UTF-8: {e}")))
    }
}

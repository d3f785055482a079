//! Endpoint secrets.
//!
//! - Generation of `whsec_` prefixed signing secrets
//! - AES-256-GCM encryption of secrets at rest

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use crate::error::{WebhookError, WebhookResult};

/// Prefix of generated secrets.
pub const SECRET_PREFIX: &str = "whsec_";

/// Number of random characters after the prefix.
const SECRET_RANDOM_LEN: usize = 32;

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// Key size for AES-256.
pub const KEY_SIZE: usize = 32;

/// Generates a new endpoint signing secret.
pub fn generate_secret() -> String {
    let random: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(SECRET_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{SECRET_PREFIX}{random}")
}

/// Encrypts and decrypts secrets stored by an endpoint store.
///
/// Ciphertext format: base64(nonce || ciphertext || tag).
#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; KEY_SIZE],
}

impl SecretCipher {
    /// Creates a cipher from a raw 32-byte key.
    pub fn new(key: &[u8]) -> WebhookResult<Self> {
        let key: [u8; KEY_SIZE] = key.try_into().map_err(|_| {
            WebhookError::EncryptionError(format!(
                "Invalid key length: expected {} bytes, got {}",
                KEY_SIZE,
                key.len()
            ))
        })?;
        Ok(Self { key })
    }

    /// Creates a cipher from a base64 encoded key.
    pub fn from_base64(encoded: &str) -> WebhookResult<Self> {
        let key = BASE64
            .decode(encoded.trim())
            .map_err(|e| WebhookError::EncryptionError(format!("Base64 decode failed: {e}")))?;
        Self::new(&key)
    }

    /// Creates a cipher with a random key that lives as long as the process.
    pub fn ephemeral() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Encrypts a plaintext secret.
    pub fn encrypt(&self, plaintext: &str) -> WebhookResult<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| WebhookError::EncryptionError(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| WebhookError::EncryptionError(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(&result))
    }

    /// Decrypts a secret produced by [`SecretCipher::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> WebhookResult<String> {
        let encrypted = BASE64
            .decode(encoded)
            .map_err(|e| WebhookError::EncryptionError(format!("Base64 decode failed: {e}")))?;

        if encrypted.len() <= NONCE_SIZE {
            return Err(WebhookError::EncryptionError(
                "Invalid encrypted data format".to_string(),
            ));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| WebhookError::EncryptionError(e.to_string()))?;
        let (nonce, ciphertext) = encrypted.split_at(NONCE_SIZE);

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| WebhookError::EncryptionError("Decryption failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| WebhookError::EncryptionError(format!("Invalid UTF-8: {e}")))
    }
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCipher([redacted])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_secret_shape() {
        let secret = generate_secret();
        assert!(secret.starts_with("whsec_"));
        assert_eq!(secret.len(), 6 + 32);
        assert!(secret[6..].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(secret, generate_secret());
    }

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = SecretCipher::ephemeral();
        let encrypted = cipher.encrypt("whsec_abc").unwrap();
        assert_ne!(encrypted, "whsec_abc");
        assert!(!encrypted.contains("whsec_abc"));
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "whsec_abc");
    }

    #[test]
    fn test_nonce_is_random() {
        let cipher = SecretCipher::ephemeral();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = SecretCipher::ephemeral().encrypt("secret").unwrap();
        assert!(SecretCipher::ephemeral().decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_key_length_checked() {
        assert!(SecretCipher::new(&[0u8; 16]).is_err());
        assert!(SecretCipher::new(&[0u8; 32]).is_ok());
        let encoded = BASE64.encode([7u8; 32]);
        assert!(SecretCipher::from_base64(&encoded).is_ok());
        assert!(SecretCipher::from_base64("not base64!").is_err());
    }

    #[test]
    fn test_tampered_data_rejected() {
        let cipher = SecretCipher::ephemeral();
        assert!(cipher.decrypt(&BASE64.encode([1u8; 8])).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        assert_eq!(format!("{:?}", SecretCipher::ephemeral()), "SecretCipher([redacted])");
    }
}

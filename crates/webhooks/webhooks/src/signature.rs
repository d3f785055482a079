//! HMAC signature generation and verification.
//!
//! Deliveries carry `X-Webhook-Signature: sha256=<hex>` where `<hex>` is the
//! lowercase hex HMAC-SHA256 of the raw request body keyed with the
//! endpoint secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Algorithm prefix of the header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Webhook signer for generating and verifying signatures.
pub struct WebhookSigner {
    secret: Vec<u8>,
}

impl WebhookSigner {
    /// Creates a new signer with the given secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Returns the hex signature of a payload.
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.mac(payload).finalize().into_bytes())
    }

    /// Returns the full header value for a payload.
    pub fn sign_header(&self, payload: &[u8]) -> String {
        format!("{}{}", SIGNATURE_PREFIX, self.sign(payload))
    }

    /// Verifies a hex signature in constant time.
    pub fn verify(&self, signature: &str, payload: &[u8]) -> bool {
        match hex::decode(signature) {
            Ok(expected) => self.mac(payload).verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }

    /// Parses and verifies a header value.
    pub fn verify_header(&self, header: &str, payload: &[u8]) -> Result<(), SignatureError> {
        let signature = header
            .trim()
            .strip_prefix(SIGNATURE_PREFIX)
            .ok_or(SignatureError::InvalidFormat)?;

        if self.verify(signature, payload) {
            Ok(())
        } else {
            Err(SignatureError::Invalid)
        }
    }

    fn mac(&self, payload: &[u8]) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(payload);
        mac
    }
}

/// Signature verification errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Header is not `sha256=<hex>`.
    #[error("Invalid signature format")]
    InvalidFormat,
    /// Signature does not match.
    #[error("Invalid signature")]
    Invalid,
}

//! Webhook receiver for verifying incoming webhooks.

use crate::error::{WebhookError, WebhookResult};
use crate::payload::Envelope;
use crate::signature::{SignatureError, WebhookSigner};

/// Verifies deliveries on the receiving side.
pub struct WebhookReceiver {
    signer: WebhookSigner,
}

impl WebhookReceiver {
    /// Creates a receiver for an endpoint secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            signer: WebhookSigner::new(secret),
        }
    }

    /// Verifies the signature header and parses the envelope.
    pub fn verify(&self, signature: &str, body: &[u8]) -> WebhookResult<Envelope> {
        self.verify_signature(signature, body)?;
        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    /// Verifies only the signature without parsing.
    pub fn verify_signature(&self, signature: &str, body: &[u8]) -> WebhookResult<()> {
        self.signer
            .verify_header(signature, body)
            .map_err(|e| match e {
                SignatureError::InvalidFormat | SignatureError::Invalid => {
                    WebhookError::InvalidSignature
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PayloadBuilder;
    use outpost_events::EventCatalog;
    use serde_json::{Map, json};
    use std::sync::Arc;

    fn signed_body(secret: &str) -> (String, String) {
        let builder = PayloadBuilder::new(Arc::new(EventCatalog::empty()), "shop", "testing");
        let mut data = Map::new();
        data.insert("order_id".to_string(), json!(42));
        let body = builder
            .build("orders.created", None, Some(data), Map::new())
            .unwrap()
            .to_body()
            .unwrap();
        let header = WebhookSigner::new(secret).sign_header(body.as_bytes());
        (body, header)
    }

    #[test]
    fn test_verify_valid_delivery() {
        let (body, header) = signed_body("whsec_receiver");
        let envelope = WebhookReceiver::new("whsec_receiver")
            .verify(&header, body.as_bytes())
            .unwrap();
        assert_eq!(envelope.event_key, "orders.created");
        assert_eq!(envelope.data["order_id"], json!(42));
    }

    #[test]
    fn test_reject_wrong_secret() {
        let (body, header) = signed_body("whsec_receiver");
        let result = WebhookReceiver::new("whsec_other").verify(&header, body.as_bytes());
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn test_reject_tampered_body() {
        let (body, header) = signed_body("whsec_receiver");
        let tampered = body.replace("42", "43");
        let result = WebhookReceiver::new("whsec_receiver").verify(&header, tampered.as_bytes());
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn test_reject_malformed_header() {
        let (body, _) = signed_body("whsec_receiver");
        let receiver = WebhookReceiver::new("whsec_receiver");
        assert!(receiver.verify("md5=abc", body.as_bytes()).is_err());
    }

    #[test]
    fn test_signed_garbage_is_invalid_payload() {
        let header = WebhookSigner::new("s").sign_header(b"not json");
        let result = WebhookReceiver::new("s").verify(&header, b"not json");
        assert!(matches!(result, Err(WebhookError::InvalidPayload(_))));
    }
}

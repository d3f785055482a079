//! Webhook error types.

use outpost_events::EventError;
use thiserror::Error;

use crate::validation::ValidationErrors;

/// Result type for webhook operations.
pub type WebhookResult<T> = Result<T, WebhookError>;

/// Error type for webhook operations.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Invalid signature.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Invalid payload.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// Queue error.
    #[error("Queue error: {0}")]
    QueueError(String),

    /// Endpoint not found.
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    /// Endpoint answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Transport level HTTP error.
    #[error("{0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// No secret available to sign a delivery.
    #[error("No signing secret for endpoint {0}")]
    MissingSecret(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Secret encryption or decryption failed.
    #[error("Encryption error: {0}")]
    EncryptionError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error raised by the event side (catalog, transformers).
    #[error(transparent)]
    Event(#[from] EventError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::InvalidPayload(err.to_string())
    }
}

impl From<reqwest::Error> for WebhookError {
    fn from(err: reqwest::Error) -> Self {
        let message = error_chain(&err);
        if err.is_timeout() {
            WebhookError::Timeout(message)
        } else {
            WebhookError::HttpError(message)
        }
    }
}

impl From<crate::queue::QueueError> for WebhookError {
    fn from(err: crate::queue::QueueError) -> Self {
        WebhookError::QueueError(err.0)
    }
}

/// Joins an error with its sources, e.g. `error sending request: connection refused`.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

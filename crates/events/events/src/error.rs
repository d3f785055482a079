//! Event error types.

use thiserror::Error;

/// Result type for event operations.
pub type EventResult<T> = Result<T, EventError>;

/// Error type for the event system.
#[derive(Debug, Error)]
pub enum EventError {
    /// Handler execution failed.
    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    /// Event serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Two different types registered under one identifier.
    #[error("Duplicate event type: {0}")]
    DuplicateEventType(String),

    /// Catalog entry references a transformer that is not registered.
    #[error("Unknown transformer '{transformer}' for event key '{key}'")]
    UnknownTransformer { key: String, transformer: String },

    /// Catalog entry is malformed.
    #[error("Invalid catalog entry '{key}': {reason}")]
    InvalidCatalogEntry { key: String, reason: String },

    /// Transformer failed to build a payload.
    #[error("Transformer '{0}' failed: {1}")]
    TransformFailed(String, String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::SerializationError(err.to_string())
    }
}

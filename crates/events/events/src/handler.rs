//! Listeners attached to the event bus.
//!
//! The webhook dispatcher subscribes one listener per listenable event type.
//! A listener reports failure through its `Result`; the bus records it and
//! keeps running the other listeners.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::EventError;
use crate::event::WebhookEvent;

/// What happened when one listener received one event.
#[derive(Debug, Clone)]
pub struct HandlerResult {
    pub handler_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl HandlerResult {
    /// Records the outcome of a listener call that took `elapsed`.
    pub fn from_outcome(
        handler_id: impl Into<String>,
        outcome: &Result<(), EventError>,
        elapsed: Duration,
    ) -> Self {
        Self {
            handler_id: handler_id.into(),
            success: outcome.is_ok(),
            error: outcome.as_ref().err().map(ToString::to_string),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Receives events fired on an [`EventBus`](crate::EventBus).
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable listener id, reported in [`HandlerResult::handler_id`].
    fn id(&self) -> &str;

    async fn handle(&self, event: &dyn WebhookEvent) -> Result<(), EventError>;
}

pub type SharedHandler = Arc<dyn EventHandler>;

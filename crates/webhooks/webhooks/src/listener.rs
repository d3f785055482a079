//! Event bus listener that dispatches webhooks.

use async_trait::async_trait;
use std::sync::Arc;

use outpost_events::{EventError, EventHandler, WebhookEvent};

use crate::dispatcher::WebhookDispatcher;

/// Dispatches every event it receives under its catalog key.
///
/// Dispatch errors are logged and never reach the event producer.
pub struct DispatchWebhookListener {
    dispatcher: Arc<WebhookDispatcher>,
}

impl DispatchWebhookListener {
    pub fn new(dispatcher: Arc<WebhookDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl EventHandler for DispatchWebhookListener {
    fn id(&self) -> &str {
        "webhooks.dispatch"
    }

    async fn handle(&self, event: &dyn WebhookEvent) -> Result<(), EventError> {
        if let Err(e) = self.dispatcher.dispatch_event(event).await {
            tracing::error!(
                event_type = event.type_name(),
                error = %e,
                "Webhook dispatch failed"
            );
        }
        Ok(())
    }
}

//! In-process event bus.
//!
//! Handlers subscribe to an event type identifier; firing an event runs every
//! handler subscribed to its type plus the wildcard handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::event::{EventType, WebhookEvent};
use crate::handler::{EventHandler, HandlerResult, SharedHandler};

/// The event bus for publishing and subscribing to events.
pub struct EventBus {
    /// Subscribers keyed by event type identifier.
    subscribers: RwLock<HashMap<String, Vec<SharedHandler>>>,
    /// Subscribers receiving every event.
    wildcard_subscribers: RwLock<Vec<SharedHandler>>,
}

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            wildcard_subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to an event type identifier. `"*"` subscribes to everything.
    pub async fn on(&self, type_name: &str, handler: impl EventHandler + 'static) {
        self.subscribe(type_name, Arc::new(handler)).await;
    }

    /// Subscribes to events of type `T`.
    pub async fn on_type<T: EventType>(&self, handler: impl EventHandler + 'static) {
        self.subscribe(T::TYPE_NAME, Arc::new(handler)).await;
    }

    /// Subscribes to all events.
    pub async fn on_all(&self, handler: impl EventHandler + 'static) {
        self.subscribe("*", Arc::new(handler)).await;
    }

    /// Subscribes a shared handler.
    pub async fn subscribe(&self, type_name: &str, handler: SharedHandler) {
        if type_name == "*" {
            self.wildcard_subscribers.write().await.push(handler);
        } else {
            self.subscribers
                .write()
                .await
                .entry(type_name.to_string())
                .or_default()
                .push(handler);
        }
    }

    /// Emits an event to all matching subscribers (fire and forget).
    ///
    /// Each handler runs on its own task; errors are logged.
    pub async fn emit(&self, event: Arc<dyn WebhookEvent>) {
        for handler in self.collect_handlers(event.type_name()).await {
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(e) = handler.handle(event.as_ref()).await {
                    tracing::error!("Event handler '{}' error: {}", handler.id(), e);
                }
            });
        }
    }

    /// Emits an event and waits for all handlers to complete.
    pub async fn emit_sync(&self, event: &dyn WebhookEvent) -> Vec<HandlerResult> {
        let handlers = self.collect_handlers(event.type_name()).await;
        let mut results = Vec::with_capacity(handlers.len());

        for handler in handlers {
            let start = Instant::now();
            let outcome = handler.handle(event).await;
            results.push(HandlerResult::from_outcome(handler.id(), &outcome, start.elapsed()));
        }

        results
    }

    /// Gets the number of subscribers for a type identifier.
    pub async fn subscriber_count(&self, type_name: &str) -> usize {
        if type_name == "*" {
            self.wildcard_subscribers.read().await.len()
        } else {
            self.subscribers
                .read()
                .await
                .get(type_name)
                .map(|v| v.len())
                .unwrap_or(0)
        }
    }

    /// Clears all subscribers.
    pub async fn clear_subscribers(&self) {
        self.subscribers.write().await.clear();
        self.wildcard_subscribers.write().await.clear();
    }

    async fn collect_handlers(&self, type_name: &str) -> Vec<SharedHandler> {
        let mut handlers = Vec::new();

        if let Some(typed) = self.subscribers.read().await.get(type_name) {
            handlers.extend(typed.iter().cloned());
        }
        handlers.extend(self.wildcard_subscribers.read().await.iter().cloned());

        handlers
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EventError;
    use crate::event::{EventKind, PlainEvent};
    use crate::value::Fields;
    use std::any::Any;

    struct Ping(&'static str);

    impl WebhookEvent for Ping {
        fn type_name(&self) -> &'static str {
            self.0
        }
        fn kind(&self) -> EventKind<'_> {
            EventKind::Plain(self)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl PlainEvent for Ping {
        fn public_fields(&self) -> Fields {
            Fields::new()
        }
    }

    struct TestHandler {
        id: String,
        received: Arc<RwLock<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl EventHandler for TestHandler {
        fn id(&self) -> &str {
            &self.id
        }

        async fn handle(&self, event: &dyn WebhookEvent) -> Result<(), EventError> {
            self.received.write().await.push(event.type_name().to_string());
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait::async_trait]
    impl EventHandler for FailingHandler {
        fn id(&self) -> &str {
            "failing"
        }

        async fn handle(&self, _event: &dyn WebhookEvent) -> Result<(), EventError> {
            Err(EventError::HandlerFailed("boom".to_string()))
        }
    }

    fn handler(id: &str, received: &Arc<RwLock<Vec<String>>>) -> TestHandler {
        TestHandler {
            id: id.to_string(),
            received: received.clone(),
        }
    }

    #[tokio::test]
    async fn test_typed_subscription() {
        let bus = EventBus::new();
        let received = Arc::new(RwLock::new(Vec::new()));

        bus.on("OrderCreated", handler("orders", &received)).await;

        bus.emit_sync(&Ping("OrderCreated")).await;
        bus.emit_sync(&Ping("UserDeleted")).await;

        let events = received.read().await;
        assert_eq!(events.as_slice(), ["OrderCreated"]);
    }

    #[tokio::test]
    async fn test_wildcard_subscription() {
        let bus = EventBus::new();
        let received = Arc::new(RwLock::new(Vec::new()));

        bus.on_all(handler("wildcard", &received)).await;

        bus.emit_sync(&Ping("A")).await;
        bus.emit_sync(&Ping("B")).await;

        assert_eq!(received.read().await.len(), 2);
        assert_eq!(bus.subscriber_count("*").await, 1);
    }

    #[tokio::test]
    async fn test_emit_sync_reports_failures() {
        let bus = EventBus::new();
        let received = Arc::new(RwLock::new(Vec::new()));

        bus.on("A", FailingHandler).await;
        bus.on("A", handler("ok", &received)).await;

        let results = bus.emit_sync(&Ping("A")).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("Handler failed: boom"));
        assert!(results[1].success);
    }

    #[tokio::test]
    async fn test_emit_runs_in_background() {
        let bus = EventBus::new();
        let received = Arc::new(RwLock::new(Vec::new()));
        bus.on("A", handler("bg", &received)).await;

        bus.emit(Arc::new(Ping("A"))).await;

        for _ in 0..50 {
            if !received.read().await.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(received.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_subscribers() {
        let bus = EventBus::new();
        let received = Arc::new(RwLock::new(Vec::new()));
        bus.on("A", handler("a", &received)).await;
        assert_eq!(bus.subscriber_count("A").await, 1);

        bus.clear_subscribers().await;
        assert_eq!(bus.subscriber_count("A").await, 0);
    }
}
